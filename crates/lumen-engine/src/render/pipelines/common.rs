//! Shared helpers for the pipelines.

use crate::render::frame::FrameContext;

// ── blend ─────────────────────────────────────────────────────────────────

pub fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── instance cursor ───────────────────────────────────────────────────────

/// Records already written into the current frame's slot.
///
/// Resets when a new frame index shows up.
#[derive(Debug, Default, Copy, Clone)]
pub(super) struct InstanceCursor {
    frame: Option<u64>,
    used: usize,
}

impl InstanceCursor {
    pub(super) fn used(&self, frame: FrameContext) -> usize {
        if self.frame == Some(frame.index) {
            self.used
        } else {
            0
        }
    }

    /// Reserves `count` records; returns the index of the first.
    pub(super) fn advance(&mut self, frame: FrameContext, count: usize) -> usize {
        let first = self.used(frame);
        self.frame = Some(frame.index);
        self.used = first + count;
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_resets_on_new_frame() {
        let f0 = FrameContext { index: 0, slot: 0 };
        let f1 = FrameContext { index: 1, slot: 1 };
        let mut cursor = InstanceCursor::default();

        assert_eq!(cursor.advance(f0, 3), 0);
        assert_eq!(cursor.advance(f0, 2), 3);
        assert_eq!(cursor.used(f0), 5);

        assert_eq!(cursor.used(f1), 0);
        assert_eq!(cursor.advance(f1, 1), 0);
    }
}
