//! Frames-in-flight pacing.
//!
//! A frame's ring slot is only handed out again once the submission that last
//! used it has signalled completion.

use crate::gpu::{CompletionSignal, GpuBackend};

/// Identity of the frame being encoded. Passed to every encode call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameContext {
    /// Monotonic frame counter.
    pub index: u64,
    /// Ring slot owned by this frame (`index mod frames_in_flight`).
    pub slot: usize,
}

#[derive(Debug)]
pub struct FramePacer {
    next_index: u64,
    in_flight: Vec<Option<CompletionSignal>>,
}

impl FramePacer {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            next_index: 0,
            in_flight: vec![None; frames_in_flight.max(1)],
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Starts the next frame, waiting on the device while its slot is still in use.
    pub fn begin_frame<B: GpuBackend>(&mut self, backend: &B) -> FrameContext {
        let index = self.next_index;
        let slot = (index % self.in_flight.len() as u64) as usize;

        if let Some(signal) = self.in_flight[slot].take() {
            if !signal.is_complete() {
                log::trace!("frame {index}: slot {slot} busy, waiting for device");
                backend.wait_for(&signal);
                if !signal.is_complete() {
                    log::warn!("frame {index}: slot {slot} still in flight after wait");
                }
            }
        }

        self.next_index += 1;
        FrameContext { index, slot }
    }

    /// Marks `frame`'s slot in flight; the returned signal goes to `submit`.
    pub fn end_frame(&mut self, frame: FrameContext) -> CompletionSignal {
        let signal = CompletionSignal::pending();
        self.in_flight[frame.slot] = Some(signal.clone());
        signal
    }

    /// Releases `frame`'s slot without a submission (dropped frame).
    pub fn abandon(&mut self, frame: FrameContext) {
        log::debug!("frame {} abandoned; slot {} released", frame.index, frame.slot);
        self.in_flight[frame.slot] = None;
    }

    pub fn is_slot_busy(&self, slot: usize) -> bool {
        self.in_flight
            .get(slot)
            .and_then(Option::as_ref)
            .is_some_and(|s| !s.is_complete())
    }

    /// Number of submitted frames not yet known complete.
    pub fn busy_slots(&self) -> usize {
        (0..self.in_flight.len())
            .filter(|slot| self.is_slot_busy(*slot))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::CaptureBackend;

    fn run_frame(pacer: &mut FramePacer, backend: &CaptureBackend) -> FrameContext {
        let frame = pacer.begin_frame(backend);
        let signal = pacer.end_frame(frame);
        backend.submit(backend.begin_commands("frame"), signal);
        frame
    }

    #[test]
    fn slots_rotate_with_frame_index() {
        let backend = CaptureBackend::new();
        let mut pacer = FramePacer::new(3);
        let slots: Vec<usize> = (0..7).map(|_| run_frame(&mut pacer, &backend).slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn waits_only_when_slot_is_still_in_flight() {
        let backend = CaptureBackend::new();
        let mut pacer = FramePacer::new(2);

        run_frame(&mut pacer, &backend);
        run_frame(&mut pacer, &backend);
        assert_eq!(backend.wait_count(), 0);
        assert_eq!(pacer.busy_slots(), 2);

        let third = run_frame(&mut pacer, &backend);
        assert_eq!(third.slot, 0);
        assert_eq!(backend.wait_count(), 1);

        backend.complete_pending();
        run_frame(&mut pacer, &backend);
        assert_eq!(backend.wait_count(), 1);
    }

    #[test]
    fn waiting_frees_the_reused_slot_only() {
        let backend = CaptureBackend::new();
        let mut pacer = FramePacer::new(3);

        for _ in 0..3 {
            run_frame(&mut pacer, &backend);
        }
        let fourth = run_frame(&mut pacer, &backend);

        assert_eq!(fourth.slot, 0);
        assert_eq!(backend.wait_count(), 1);
        assert!(pacer.is_slot_busy(1));
        assert!(pacer.is_slot_busy(2));
        assert_eq!(pacer.busy_slots(), 3);
    }

    #[test]
    fn abandoned_frame_frees_its_slot() {
        let backend = CaptureBackend::new();
        let mut pacer = FramePacer::new(1);

        let frame = pacer.begin_frame(&backend);
        pacer.abandon(frame);
        assert!(!pacer.is_slot_busy(0));

        let next = pacer.begin_frame(&backend);
        assert_eq!(next.index, 1);
        assert_eq!(backend.wait_count(), 0);
    }

    #[test]
    fn zero_frames_in_flight_is_clamped() {
        assert_eq!(FramePacer::new(0).frames_in_flight(), 1);
    }
}
