//! 注入页面执行的脚本

/// 页面总高度和视口高度
pub const SCROLL_METRICS_JS: &str = r#"
        () => {
            const root = document.scrollingElement || document.documentElement;
            return {
                scrollHeight: Math.max(root.scrollHeight, document.body ? document.body.scrollHeight : 0),
                viewportHeight: window.innerHeight || root.clientHeight
            };
        }
    "#;

pub const SCROLL_TOP_JS: &str = r#"
        () => {
            window.scrollTo(0, 0);
            return true;
        }
    "#;

pub fn scroll_to_js(y: u64) -> String {
    format!(
        r#"
        () => {{
            window.scrollTo(0, {});
            return window.scrollY;
        }}
    "#,
        y
    )
}

/// 给元素标上计算背景色、给 svg 标上渲染尺寸，抓取整页 HTML 后再清掉标注
pub const SNAPSHOT_JS: &str = r#"
        () => {
            const BG = 'data-scrape-bg';
            const W = 'data-scrape-w';
            const H = 'data-scrape-h';
            const body = document.body;
            if (body) {
                for (const el of body.querySelectorAll('*')) {
                    const bg = window.getComputedStyle(el).backgroundColor;
                    if (bg && bg !== 'transparent' && bg !== 'rgba(0, 0, 0, 0)') {
                        el.setAttribute(BG, bg);
                    }
                }
            }
            for (const svg of document.querySelectorAll('svg')) {
                const rect = svg.getBoundingClientRect();
                svg.setAttribute(W, String(Math.round(rect.width)));
                svg.setAttribute(H, String(Math.round(rect.height)));
            }
            const html = document.documentElement.outerHTML;
            for (const el of document.querySelectorAll('[' + BG + '], [' + W + '], [' + H + ']')) {
                el.removeAttribute(BG);
                el.removeAttribute(W);
                el.removeAttribute(H);
            }
            return { url: location.href, html: html };
        }
    "#;
