//! Growable multi-channel sample ring with absolute indexing.

/// Per-channel circular store addressed by absolute sample index.
///
/// Capacity is a power of two so `index & mask` locates a sample. Growth
/// doubles the capacity and copies only the span the caller still needs.
#[derive(Debug, Clone)]
pub struct FrameRing {
    channels: Vec<Vec<f32>>,
    mask: usize,
    write_index: u64,
}

impl FrameRing {
    /// `min_capacity` is rounded up to a power of two. `channels` must be non-zero.
    pub fn new(channels: usize, min_capacity: usize) -> Self {
        let capacity = min_capacity.max(1).next_power_of_two();
        Self {
            channels: vec![vec![0.0; capacity]; channels],
            mask: capacity - 1,
            write_index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Absolute number of samples written per channel.
    pub fn write_index(&self) -> u64 {
        self.write_index
    }

    /// Make room for `additional` samples while keeping everything from
    /// `keep_from` up to the write index. Returns true if the ring grew.
    pub fn reserve(&mut self, keep_from: u64, additional: usize) -> bool {
        let retained = (self.write_index - keep_from) as usize;
        let needed = retained + additional;
        if needed <= self.capacity() {
            return false;
        }

        let mut capacity = self.capacity();
        while capacity < needed {
            capacity *= 2;
        }
        tracing::debug!(
            from = self.capacity(),
            to = capacity,
            "frame ring capacity doubled"
        );

        let mask = capacity - 1;
        for channel in &mut self.channels {
            let mut grown = vec![0.0; capacity];
            for index in keep_from..self.write_index {
                grown[index as usize & mask] = channel[index as usize & self.mask];
            }
            *channel = grown;
        }
        self.mask = mask;
        true
    }

    /// Append `frames` samples per channel. Missing channels or short
    /// slices are zero-filled; extra channels are ignored. The caller must
    /// [`reserve`](Self::reserve) first.
    pub fn write(&mut self, block: &[&[f32]], frames: usize) {
        let start = self.write_index as usize & self.mask;
        let first = frames.min(self.capacity() - start);

        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let src = block.get(ch).copied().unwrap_or(&[]);
            if src.len() >= frames {
                channel[start..start + first].copy_from_slice(&src[..first]);
                channel[..frames - first].copy_from_slice(&src[first..frames]);
            } else {
                for i in 0..frames {
                    let value = src.get(i).copied().unwrap_or(0.0);
                    channel[(start + i) & self.mask] = value;
                }
            }
        }
        self.write_index += frames as u64;
    }

    /// Copy `out.len()` samples of `channel` starting at absolute index `start`.
    pub fn read_into(&self, channel: usize, start: u64, out: &mut [f32]) {
        let data = &self.channels[channel];
        let pos = start as usize & self.mask;
        let first = out.len().min(self.capacity() - pos);
        out[..first].copy_from_slice(&data[pos..pos + first]);
        let rest = out.len() - first;
        out[first..].copy_from_slice(&data[..rest]);
    }

    /// Zero the contents and rewind to index 0. Capacity is kept.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.fill(0.0);
        }
        self.write_index = 0;
    }
}
