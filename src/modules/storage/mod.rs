pub mod assets;
pub mod emitter;

pub use assets::{AssetMode, AssetOptions, FetchedAsset, ImageFetcher, Materialized, ReqwestFetcher, materialize_assets};
pub use emitter::{EmitOptions, EmitOutcome, EmitTarget, emit};
