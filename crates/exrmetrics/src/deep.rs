//! Two-phase storage for deep parts.
//!
//! Deep pixels hold a variable number of samples. Reading them takes two
//! passes over the codec:
//!
//! 1. read the per-pixel sample counts into [`SampleCounts`]
//! 2. [`DeepFrameBuffer::allocate_samples`] sums the counts, allocates one
//!    contiguous block per channel and records a [`SampleSpan`] for every
//!    pixel, then the samples themselves are read into those spans
//!
//! Spans are laid out in scan order (row by row, left to right) without gaps,
//! so the span of each pixel starts where the previous one ended. The span
//! table is measured in samples and shared by all channels; a channel finds
//! its bytes by scaling a span with its own sample size.

use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::Bounds;
use crate::header::{Channel, SampleType};
use crate::layout::PixelAddressing;

/// Per-pixel sample counts over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCounts {
    addressing: PixelAddressing,
    counts: Vec<u32>,
}

impl SampleCounts {
    /// Zeroed counts covering `window`.
    pub fn new(window: Bounds) -> Self {
        let addressing = PixelAddressing::new(window);
        Self { addressing, counts: vec![0; addressing.pixel_count()] }
    }

    /// Coordinate mapping.
    #[inline]
    pub fn addressing(&self) -> &PixelAddressing {
        &self.addressing
    }

    /// Covered window.
    #[inline]
    pub fn window(&self) -> Bounds {
        self.addressing.window()
    }

    /// Count of pixel `(x, y)`.
    pub fn get(&self, x: i32, y: i32) -> Result<u32> {
        Ok(self.counts[self.addressing.index(x, y)?])
    }

    /// Sets the count of pixel `(x, y)`.
    pub fn set(&mut self, x: i32, y: i32, count: u32) -> Result<()> {
        let index = self.addressing.index(x, y)?;
        self.counts[index] = count;
        Ok(())
    }

    /// Counts in scan order.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }

    /// Counts in scan order, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.counts
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }
}

/// Location of one pixel's samples inside a channel block, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleSpan {
    /// First sample.
    pub start: usize,
    /// Number of samples.
    pub count: usize,
}

impl SampleSpan {
    /// One past the last sample.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Byte range for samples of `sample_size` bytes.
    #[inline]
    pub fn byte_range(&self, sample_size: usize) -> Range<usize> {
        self.start * sample_size..self.end() * sample_size
    }
}

/// Builds the gap-free span table for `counts`, in scan order.
pub fn spans_from_counts(counts: &[u32]) -> Vec<SampleSpan> {
    let mut next = 0usize;
    counts
        .iter()
        .map(|&count| {
            let span = SampleSpan { start: next, count: count as usize };
            next = span.end();
            span
        })
        .collect()
}

/// Sample storage for one deep channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepChannelStorage {
    channel: Channel,
    data: Vec<u8>,
}

impl DeepChannelStorage {
    /// Channel description.
    #[inline]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// All samples of the channel, native-endian, in span order.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Counts, span table and per-channel sample blocks for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct DeepFrameBuffer {
    counts: SampleCounts,
    spans: Option<Vec<SampleSpan>>,
    channels: Vec<DeepChannelStorage>,
}

impl DeepFrameBuffer {
    /// Creates the count buffer; sample storage stays empty until
    /// [`allocate_samples`](Self::allocate_samples).
    pub fn new(window: Bounds, channels: &[Channel]) -> Self {
        Self {
            counts: SampleCounts::new(window),
            spans: None,
            channels: channels
                .iter()
                .map(|c| DeepChannelStorage { channel: c.clone(), data: Vec::new() })
                .collect(),
        }
    }

    /// Covered window.
    #[inline]
    pub fn window(&self) -> Bounds {
        self.counts.window()
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.counts.addressing().pixel_count()
    }

    /// Per-pixel counts.
    #[inline]
    pub fn sample_counts(&self) -> &SampleCounts {
        &self.counts
    }

    /// Per-pixel counts, mutable. Only meaningful before allocation.
    #[inline]
    pub fn sample_counts_mut(&mut self) -> &mut SampleCounts {
        &mut self.counts
    }

    /// Channel storage, in description order.
    #[inline]
    pub fn channels(&self) -> &[DeepChannelStorage] {
        &self.channels
    }

    /// Index of the channel called `name`.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.channel.name == name)
    }

    /// Bytes per sample summed over channels.
    pub fn bytes_per_sample(&self) -> usize {
        self.channels.iter().map(|c| c.channel.byte_size()).sum()
    }

    /// Span table, once samples are allocated.
    #[inline]
    pub fn spans(&self) -> Option<&[SampleSpan]> {
        self.spans.as_deref()
    }

    /// Returns `true` once [`allocate_samples`](Self::allocate_samples) ran.
    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.spans.is_some()
    }

    /// Total number of samples per channel, zero before allocation.
    pub fn total_samples(&self) -> usize {
        self.spans
            .as_ref()
            .and_then(|s| s.last())
            .map_or(0, SampleSpan::end)
    }

    /// Sizes every channel block from the current counts and builds the span
    /// table. Returns the total sample count.
    pub fn allocate_samples(&mut self) -> Result<usize> {
        let spans = spans_from_counts(self.counts.as_slice());
        let total = spans.last().map_or(0, SampleSpan::end);

        for storage in &mut self.channels {
            storage.data = vec![0; total * storage.channel.byte_size()];
        }
        self.spans = Some(spans);

        debug!(
            window = %self.window(),
            total_samples = total,
            bytes = total * self.bytes_per_sample(),
            "deep samples allocated"
        );
        Ok(total)
    }

    fn channel_storage(&self, channel: usize) -> Result<&DeepChannelStorage> {
        self.channels.get(channel).ok_or_else(|| {
            Error::invalid_argument(format!(
                "channel index {channel} out of range for {} channels",
                self.channels.len()
            ))
        })
    }

    /// Span of pixel `(x, y)`.
    pub fn span(&self, x: i32, y: i32) -> Result<SampleSpan> {
        let spans = self.spans.as_ref().ok_or_else(|| {
            Error::layout_mismatch("deep samples accessed before allocation")
        })?;
        Ok(spans[self.counts.addressing().index(x, y)?])
    }

    /// Sample bytes of channel `channel` at pixel `(x, y)`.
    pub fn pixel_samples(&self, channel: usize, x: i32, y: i32) -> Result<&[u8]> {
        let span = self.span(x, y)?;
        let storage = self.channel_storage(channel)?;
        Ok(&storage.data[span.byte_range(storage.channel.byte_size())])
    }

    /// Sample bytes of channel `channel` at pixel `(x, y)`, mutable.
    pub fn pixel_samples_mut(&mut self, channel: usize, x: i32, y: i32) -> Result<&mut [u8]> {
        let span = self.span(x, y)?;
        self.channel_storage(channel)?;
        let storage = &mut self.channels[channel];
        let size = storage.channel.byte_size();
        Ok(&mut storage.data[span.byte_range(size)])
    }

    /// Raw size: sample bytes plus one 32-bit count per pixel.
    pub fn raw_byte_size(&self) -> usize {
        self.total_samples() * self.bytes_per_sample() + self.pixel_count() * SampleType::U32.byte_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> Vec<Channel> {
        vec![
            Channel::new("A", SampleType::F16),
            Channel::new("Z", SampleType::F32),
        ]
    }

    #[test]
    fn test_spans_are_contiguous() {
        let spans = spans_from_counts(&[2, 0, 3, 1]);
        assert_eq!(spans[0], SampleSpan { start: 0, count: 2 });
        assert_eq!(spans[1], SampleSpan { start: 2, count: 0 });
        assert_eq!(spans[2], SampleSpan { start: 2, count: 3 });
        assert_eq!(spans[3], SampleSpan { start: 5, count: 1 });
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start);
        }
    }

    #[test]
    fn test_allocate_samples() {
        let mut frame = DeepFrameBuffer::new(Bounds::new(5, 5, 6, 6), &channels());
        assert!(!frame.is_allocated());
        assert!(frame.pixel_samples(0, 5, 5).is_err());

        let counts = frame.sample_counts_mut();
        counts.set(5, 5, 2).unwrap();
        counts.set(6, 5, 0).unwrap();
        counts.set(5, 6, 3).unwrap();
        counts.set(6, 6, 1).unwrap();

        let total = frame.allocate_samples().unwrap();
        assert_eq!(total, 6);
        assert_eq!(frame.total_samples(), 6);
        assert_eq!(frame.channels()[0].data().len(), 12);
        assert_eq!(frame.channels()[1].data().len(), 24);

        assert_eq!(frame.span(5, 6).unwrap(), SampleSpan { start: 2, count: 3 });
        assert_eq!(frame.pixel_samples(1, 5, 6).unwrap().len(), 12);
        assert!(frame.pixel_samples(0, 6, 5).unwrap().is_empty());
    }

    #[test]
    fn test_raw_byte_size() {
        let mut frame = DeepFrameBuffer::new(Bounds::new(0, 0, 1, 1), &channels());
        frame.sample_counts_mut().as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        frame.allocate_samples().unwrap();
        // 10 samples of 6 bytes, plus 4 counts
        assert_eq!(frame.raw_byte_size(), 76);
    }

    #[test]
    fn test_empty_counts() {
        let mut frame = DeepFrameBuffer::new(Bounds::new(0, 0, 2, 2), &channels());
        assert_eq!(frame.allocate_samples().unwrap(), 0);
        assert!(frame.channels().iter().all(|c| c.data().is_empty()));
        assert_eq!(frame.raw_byte_size(), 36);
    }
}
