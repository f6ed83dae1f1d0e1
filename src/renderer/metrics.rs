//! Performance metrics for the frame pipeline.

use glam::Vec2;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::core::error::Result;
use crate::renderer::backend::{RenderBackend, ScreenRect, SpriteId};
use crate::renderer::color::Color;
use crate::renderer::pipeline::FramePass;

/// Draw calls issued by one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub pass: FramePass,
    pub draw_calls: u32,
}

/// Frames kept for the rolling frame-time average.
const FRAME_WINDOW: usize = 120;

/// Counters for the last drawn frame plus a rolling frame-time window.
#[derive(Default)]
pub struct RenderMetrics {
    frame_times: VecDeque<Duration>,
    frame_start: Option<Instant>,
    frames_recorded: u64,
    passes: Vec<PassStats>,
    pub draw_calls: u32,
    pub palette_uploads: u32,
    pub world_renderables: usize,
    pub effect_renderables: usize,
    pub selection_renderables: usize,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-frame counters and start timing.
    pub fn begin_frame(&mut self) {
        *self = Self {
            frame_times: std::mem::take(&mut self.frame_times),
            frame_start: Some(Instant::now()),
            frames_recorded: self.frames_recorded,
            ..Self::default()
        };
    }

    /// Store the per-pass counters of the frame started by `begin_frame`.
    pub fn end_frame(&mut self, passes: Vec<PassStats>, palette_uploads: u32) {
        self.draw_calls = passes.iter().map(|p| p.draw_calls).sum();
        self.passes = passes;
        self.palette_uploads = palette_uploads;
        self.frames_recorded += 1;

        if let Some(start) = self.frame_start.take() {
            if self.frame_times.len() == FRAME_WINDOW {
                self.frame_times.pop_front();
            }
            self.frame_times.push_back(start.elapsed());
        }
    }

    /// Passes run in the last frame, in order.
    pub fn passes(&self) -> &[PassStats] {
        &self.passes
    }

    pub fn pass_draw_calls(&self, pass: FramePass) -> Option<u32> {
        self.passes
            .iter()
            .find(|p| p.pass == pass)
            .map(|p| p.draw_calls)
    }

    /// Frames ended so far, including aborted ones.
    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Mean over the last 120 frames.
    pub fn avg_frame_time_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        let total: Duration = self.frame_times.iter().sum();
        total.as_secs_f32() * 1000.0 / self.frame_times.len() as f32
    }
}

/// Forwards to another backend while counting draw calls per pass.
pub struct MeteredBackend<'a> {
    inner: &'a mut dyn RenderBackend,
    passes: Vec<PassStats>,
    palette_uploads: u32,
}

impl<'a> MeteredBackend<'a> {
    pub fn new(inner: &'a mut dyn RenderBackend) -> Self {
        Self {
            inner,
            passes: Vec::new(),
            palette_uploads: 0,
        }
    }

    /// Attribute following draw calls to `pass`.
    pub fn begin_pass(&mut self, pass: FramePass) {
        self.passes.push(PassStats {
            pass,
            draw_calls: 0,
        });
    }

    pub fn finish(self) -> (Vec<PassStats>, u32) {
        (self.passes, self.palette_uploads)
    }

    fn record_draw_call(&mut self) {
        if let Some(current) = self.passes.last_mut() {
            current.draw_calls += 1;
        }
    }
}

impl RenderBackend for MeteredBackend<'_> {
    fn upload_palette(&mut self, data: &[u8], height: usize) -> Result<()> {
        self.palette_uploads += 1;
        self.inner.upload_palette(data, height)
    }

    fn enable_scissor(&mut self, rect: ScreenRect) -> Result<()> {
        self.inner.enable_scissor(rect)
    }

    fn disable_scissor(&mut self) -> Result<()> {
        self.inner.disable_scissor()
    }

    fn begin_batch(&mut self) -> Result<()> {
        self.inner.begin_batch()
    }

    fn stage_sprite(&mut self, sprite: SpriteId, palette: usize) -> Result<()> {
        self.inner.stage_sprite(sprite, palette)
    }

    fn end_batch(&mut self) -> Result<()> {
        self.inner.end_batch()
    }

    fn draw_sprite(
        &mut self,
        sprite: SpriteId,
        palette: usize,
        origin: Vec2,
        scale: f32,
    ) -> Result<()> {
        self.record_draw_call();
        self.inner.draw_sprite(sprite, palette, origin, scale)
    }

    fn draw_line(&mut self, a: Vec2, b: Vec2, width: f32, color: Color) -> Result<()> {
        self.record_draw_call();
        self.inner.draw_line(a, b, width, color)
    }

    fn fill_rect(&mut self, top_left: Vec2, bottom_right: Vec2, color: Color) -> Result<()> {
        self.record_draw_call();
        self.inner.fill_rect(top_left, bottom_right, color)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::RecordingBackend;
    use std::thread;

    #[test]
    fn test_metered_counts_per_pass() {
        let mut recording = RecordingBackend::new();
        let mut metered = MeteredBackend::new(&mut recording);

        metered.begin_pass(FramePass::RefreshPalette);
        metered.upload_palette(&[0u8; 1024], 1).unwrap();
        metered.begin_pass(FramePass::MainSorted);
        metered.draw_line(Vec2::ZERO, Vec2::ONE, 1.0, Color::WHITE).unwrap();
        metered.draw_sprite(1, 0, Vec2::ZERO, 1.0).unwrap();
        metered.flush().unwrap();

        let (passes, uploads) = metered.finish();
        assert_eq!(uploads, 1);
        assert_eq!(
            passes,
            vec![
                PassStats { pass: FramePass::RefreshPalette, draw_calls: 0 },
                PassStats { pass: FramePass::MainSorted, draw_calls: 2 },
            ]
        );
        assert_eq!(recording.commands().len(), 4);
    }

    #[test]
    fn test_metrics_recording() {
        let mut metrics = RenderMetrics::new();

        metrics.begin_frame();
        thread::sleep(Duration::from_millis(1));
        metrics.end_frame(
            vec![PassStats { pass: FramePass::Terrain, draw_calls: 3 }],
            1,
        );

        assert_eq!(metrics.draw_calls, 3);
        assert_eq!(metrics.palette_uploads, 1);
        assert_eq!(metrics.pass_draw_calls(FramePass::Terrain), Some(3));
        assert_eq!(metrics.pass_draw_calls(FramePass::MainSorted), None);
        assert!(metrics.avg_frame_time_ms() >= 1.0);

        metrics.begin_frame();
        assert_eq!(metrics.draw_calls, 0);
        assert!(metrics.passes().is_empty());
        assert_eq!(metrics.frames_recorded(), 1);
    }

    #[test]
    fn test_frame_window_is_bounded() {
        let mut metrics = RenderMetrics::new();
        for _ in 0..FRAME_WINDOW + 5 {
            metrics.begin_frame();
            metrics.end_frame(Vec::new(), 0);
        }
        assert_eq!(metrics.frame_times.len(), FRAME_WINDOW);
        assert_eq!(metrics.frames_recorded(), (FRAME_WINDOW + 5) as u64);
    }
}
