//! Flat frame buffers addressed by absolute pixel coordinates.
//!
//! A buffer covers exactly one data window, which need not start at the
//! origin. The sample for pixel `(x, y)` sits at element
//! `(y - min_y) * width + (x - min_x)`, computed here with an explicit bounds
//! check instead of a pre-shifted base pointer.

use std::ops::Range;

use tracing::trace;

use crate::error::{Error, Result};
use crate::geometry::Bounds;
use crate::header::{Channel, SampleType};

/// Affine mapping from pixel coordinates to element indices of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAddressing {
    window: Bounds,
    width: usize,
}

impl PixelAddressing {
    /// Addressing for a buffer covering `window`.
    pub fn new(window: Bounds) -> Self {
        Self { window, width: window.width() }
    }

    /// Covered window.
    #[inline]
    pub fn window(&self) -> Bounds {
        self.window
    }

    /// Elements per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of addressable pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.window.pixel_count()
    }

    /// Element index of `(x, y)`.
    pub fn index(&self, x: i32, y: i32) -> Result<usize> {
        if !self.window.contains(x, y) {
            return Err(Error::out_of_bounds(x, y, self.window));
        }
        let row = (i64::from(y) - i64::from(self.window.min_y)) as usize;
        let col = (i64::from(x) - i64::from(self.window.min_x)) as usize;
        Ok(row * self.width + col)
    }

    /// Element range of row `y` between columns `min_x..=max_x`.
    pub fn row_range(&self, y: i32, min_x: i32, max_x: i32) -> Result<Range<usize>> {
        let start = self.index(min_x, y)?;
        let end = self.index(max_x, y)?;
        Ok(start..end + 1)
    }
}

/// Contiguous storage for one channel over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    channel: Channel,
    addressing: PixelAddressing,
    data: Vec<u8>,
}

impl ChannelBuffer {
    /// Allocates a zeroed buffer for `channel` over `window`.
    pub fn new(channel: Channel, window: Bounds) -> Self {
        let addressing = PixelAddressing::new(window);
        let data = vec![0; addressing.pixel_count() * channel.byte_size()];
        Self { channel, addressing, data }
    }

    /// Channel description.
    #[inline]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Sample storage type.
    #[inline]
    pub fn sample_type(&self) -> SampleType {
        self.channel.sample_type
    }

    /// Coordinate mapping.
    #[inline]
    pub fn addressing(&self) -> &PixelAddressing {
        &self.addressing
    }

    /// Raw native-endian bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw native-endian bytes, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of the sample at `(x, y)`.
    pub fn sample(&self, x: i32, y: i32) -> Result<&[u8]> {
        let size = self.channel.byte_size();
        let start = self.addressing.index(x, y)? * size;
        Ok(&self.data[start..start + size])
    }

    /// Bytes of the sample at `(x, y)`, mutable.
    pub fn sample_mut(&mut self, x: i32, y: i32) -> Result<&mut [u8]> {
        let size = self.channel.byte_size();
        let start = self.addressing.index(x, y)? * size;
        Ok(&mut self.data[start..start + size])
    }

    /// Bytes of row `y` between columns `min_x..=max_x`.
    pub fn row(&self, y: i32, min_x: i32, max_x: i32) -> Result<&[u8]> {
        let size = self.channel.byte_size();
        let range = self.addressing.row_range(y, min_x, max_x)?;
        Ok(&self.data[range.start * size..range.end * size])
    }

    /// Bytes of row `y` between columns `min_x..=max_x`, mutable.
    pub fn row_mut(&mut self, y: i32, min_x: i32, max_x: i32) -> Result<&mut [u8]> {
        let size = self.channel.byte_size();
        let range = self.addressing.row_range(y, min_x, max_x)?;
        Ok(&mut self.data[range.start * size..range.end * size])
    }

    /// Sample at `(x, y)` as `f32`.
    pub fn get_f32(&self, x: i32, y: i32) -> Result<f32> {
        Ok(self.sample_type().read_f32(self.sample(x, y)?))
    }

    /// Stores `value` at `(x, y)`, converting to the buffer's type.
    pub fn set_f32(&mut self, x: i32, y: i32, value: f32) -> Result<()> {
        let sample_type = self.sample_type();
        sample_type.write_f32(value, self.sample_mut(x, y)?);
        Ok(())
    }
}

/// One [`ChannelBuffer`] per channel, all covering the same window.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    window: Bounds,
    channels: Vec<ChannelBuffer>,
}

impl FrameBuffer {
    /// Allocates zeroed storage for `channels` over `window`.
    ///
    /// Each channel gets `pixel_count * sample_size` bytes in the type given
    /// by its description.
    pub fn build(window: Bounds, channels: &[Channel]) -> Self {
        let channels: Vec<_> = channels
            .iter()
            .map(|c| ChannelBuffer::new(c.clone(), window))
            .collect();

        let frame = Self { window, channels };
        trace!(
            window = %window,
            channels = frame.channels.len(),
            bytes = frame.byte_size(),
            "FrameBuffer::build"
        );
        frame
    }

    /// Covered window.
    #[inline]
    pub fn window(&self) -> Bounds {
        self.window
    }

    /// Number of pixels per channel.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.window.pixel_count()
    }

    /// Bytes per pixel summed over channels.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels.iter().map(|c| c.channel.byte_size()).sum()
    }

    /// Total allocated bytes.
    pub fn byte_size(&self) -> usize {
        self.pixel_count() * self.bytes_per_pixel()
    }

    /// All channel buffers, in description order.
    #[inline]
    pub fn channels(&self) -> &[ChannelBuffer] {
        &self.channels
    }

    /// All channel buffers, mutable.
    #[inline]
    pub fn channels_mut(&mut self) -> &mut [ChannelBuffer] {
        &mut self.channels
    }

    /// Buffer of the channel called `name`.
    pub fn channel(&self, name: &str) -> Option<&ChannelBuffer> {
        self.channels.iter().find(|c| c.channel.name == name)
    }

    /// Buffer of the channel called `name`, mutable.
    pub fn channel_mut(&mut self, name: &str) -> Option<&mut ChannelBuffer> {
        self.channels.iter_mut().find(|c| c.channel.name == name)
    }
}
