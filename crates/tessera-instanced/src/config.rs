use crate::backend::BackendKind;

/// Tunables for recording, combining and submission.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedConfig {
    /// A rect-only op whose pixel load exceeds this refuses to merge with
    /// non-rect ops. Large rects slow down a mixed-shape program more than the
    /// saved draw call is worth.
    pub rect_merge_pixel_threshold: f32,
    /// Coverage-AA ovals at least this large (device area) use the 16-gon geometry.
    pub large_oval_area: f32,
    /// How many pending ops [`OpList`](crate::OpList) tries to merge a new op into.
    pub op_list_lookback: usize,
    /// Log every recorded and combined op at `trace`.
    pub log_ops: bool,
    /// Force a backend instead of selecting one from the device caps.
    pub backend_override: Option<BackendKind>,
}

impl Default for InstancedConfig {
    fn default() -> Self {
        Self {
            rect_merge_pixel_threshold: 256.0 * 256.0,
            large_oval_area: 256.0 * 256.0,
            op_list_lookback: 10,
            log_ops: false,
            backend_override: None,
        }
    }
}

impl InstancedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rect_merge_pixel_threshold(mut self, pixels: f32) -> Self {
        self.rect_merge_pixel_threshold = pixels;
        self
    }

    pub fn with_large_oval_area(mut self, pixels: f32) -> Self {
        self.large_oval_area = pixels;
        self
    }

    pub fn with_op_list_lookback(mut self, lookback: usize) -> Self {
        self.op_list_lookback = lookback;
        self
    }

    pub fn with_log_ops(mut self, on: bool) -> Self {
        self.log_ops = on;
        self
    }

    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend_override = Some(kind);
        self
    }
}
