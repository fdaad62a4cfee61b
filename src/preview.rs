//! Page preview with last-request-wins semantics.
//!
//! Only one preview is outstanding at a time. Asking for a new page cancels
//! the previous request, and a render that finishes after being superseded is
//! discarded rather than shown.

use crate::cancellation::{CancellationToken, LatestOnly};
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub page: u32,
    token: CancellationToken,
}

impl PreviewRequest {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
pub struct PreviewController {
    total_pages: u32,
    current_page: u32,
    requests: LatestOnly,
}

impl PreviewController {
    pub fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            current_page: 1,
            requests: LatestOnly::new(),
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Clamp `page` into the document and issue a request for it.
    pub fn go_to_page(&mut self, page: i64) -> PreviewRequest {
        let last = i64::from(self.total_pages.max(1));
        let page = page.clamp(1, last) as u32;
        self.current_page = page;
        debug!(page, "Preview requested");
        PreviewRequest {
            page,
            token: self.requests.issue(),
        }
    }

    pub fn next_page(&mut self) -> PreviewRequest {
        self.go_to_page(i64::from(self.current_page) + 1)
    }

    pub fn cancel(&mut self) {
        self.requests.cancel_all();
    }
}

/// Run `render` for `request`. Returns `None` when the request was superseded
/// before or during rendering.
pub fn render_preview<F>(request: &PreviewRequest, render: F) -> Result<Option<String>>
where
    F: FnOnce(u32) -> Result<String>,
{
    if request.is_cancelled() {
        return Ok(None);
    }
    let output = render(request.page)?;
    if request.token.check_cancelled("after-render").is_err() {
        debug!(page = request.page, "Discarding superseded preview");
        return Ok(None);
    }
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_pages_are_clamped() {
        let mut preview = PreviewController::new(5);
        assert_eq!(preview.go_to_page(0).page, 1);
        assert_eq!(preview.go_to_page(99).page, 5);
        assert_eq!(preview.next_page().page, 5);
        assert_eq!(preview.go_to_page(2).page, 2);
        assert_eq!(preview.next_page().page, 3);
        assert_eq!(preview.current_page(), 3);
    }

    #[test]
    fn cancel_discards_the_outstanding_request() {
        let mut preview = PreviewController::new(3);
        let request = preview.go_to_page(2);
        preview.cancel();
        assert!(request.is_cancelled());
        assert_eq!(render_preview(&request, |p| Ok(format!("page {p}"))).unwrap(), None);
    }

    #[test]
    fn newer_request_supersedes_older_render() {
        let mut preview = PreviewController::new(10);
        let first = preview.go_to_page(3);
        let second = preview.go_to_page(4);
        assert!(first.is_cancelled());

        assert_eq!(render_preview(&first, |p| Ok(format!("page {p}"))).unwrap(), None);
        assert_eq!(
            render_preview(&second, |p| Ok(format!("page {p}"))).unwrap(),
            Some("page 4".to_string())
        );
    }

    #[test]
    fn request_cancelled_mid_render_is_discarded() {
        let mut preview = PreviewController::new(10);
        let request = preview.go_to_page(2);
        let result = render_preview(&request, |p| {
            preview.go_to_page(7);
            Ok(format!("page {p}"))
        })
        .unwrap();
        assert_eq!(result, None);
        assert_eq!(preview.current_page(), 7);
    }
}
