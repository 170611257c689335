use super::handles::BufferHandle;

/// Frame-scoped uniform storage that instances borrow word ranges from.
///
/// Offsets and counts are in 32-bit words.
pub trait DynamicUniformBuffer {
    /// Reserves `word_count` words and returns the word offset of the chunk.
    fn allocate_chunk(&mut self, word_count: u32) -> u32;

    /// Writable view over a chunk previously returned by `allocate_chunk`.
    fn map_buffer_f32(&mut self, word_offset: u32, word_count: u32) -> &mut [f32];

    /// Device buffer that backs the storage. May change while the frame is
    /// being recorded (e.g. after growth), so read it at submission time.
    fn buffer(&self) -> BufferHandle;
}

/// 64 words = 256 bytes, the usual `min_uniform_buffer_offset_alignment`.
pub const DEFAULT_ALIGNMENT_WORDS: u32 = 64;

/// CPU-side [`DynamicUniformBuffer`].
///
/// Chunks are bump-allocated from a word vector that only grows; `reset`
/// rewinds it for the next frame. Upload the used range with
/// `queue.write_buffer(buffer, 0, arena.as_bytes())` (or the backend's
/// equivalent) before the pass that reads it executes.
#[derive(Debug, Clone)]
pub struct UniformArena {
    buffer: BufferHandle,
    words: Vec<f32>,
    used: u32,
    alignment: u32,
}

impl UniformArena {
    pub fn new(buffer: BufferHandle) -> Self {
        Self::with_alignment(buffer, DEFAULT_ALIGNMENT_WORDS)
    }

    /// `alignment_words` must be a power of two.
    pub fn with_alignment(buffer: BufferHandle, alignment_words: u32) -> Self {
        assert!(
            alignment_words.is_power_of_two(),
            "uniform alignment must be a power of two, got {alignment_words}"
        );
        Self {
            buffer,
            words: Vec::new(),
            used: 0,
            alignment: alignment_words,
        }
    }

    /// Words handed out this frame, alignment padding included.
    #[inline]
    pub fn used_words(&self) -> u32 {
        self.used
    }

    #[inline]
    pub fn capacity_words(&self) -> usize {
        self.words.len()
    }

    /// Used range as bytes, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words[..self.used as usize])
    }

    /// Swaps the backing device buffer, e.g. after the caller reallocated it
    /// to fit `capacity_words`.
    pub fn set_buffer(&mut self, buffer: BufferHandle) {
        self.buffer = buffer;
    }

    /// Rewinds for a new frame. Storage is kept.
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

impl DynamicUniformBuffer for UniformArena {
    fn allocate_chunk(&mut self, word_count: u32) -> u32 {
        let mask = self.alignment - 1;
        let offset = (self.used + mask) & !mask;
        let end = offset + word_count;

        if end as usize > self.words.len() {
            let new_len = (end as usize).next_power_of_two().max(self.alignment as usize * 16);
            log::debug!(
                "uniform arena grows {} -> {} words",
                self.words.len(),
                new_len
            );
            self.words.resize(new_len, 0.0);
        }

        self.used = end;
        offset
    }

    fn map_buffer_f32(&mut self, word_offset: u32, word_count: u32) -> &mut [f32] {
        let start = word_offset as usize;
        let end = start + word_count as usize;
        debug_assert!(
            end <= self.used as usize,
            "mapping words {start}..{end} past the allocated range (used {})",
            self.used
        );
        &mut self.words[start..end]
    }

    #[inline]
    fn buffer(&self) -> BufferHandle {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_aligned_and_disjoint() {
        let mut arena = UniformArena::with_alignment(BufferHandle::new(1), 16);
        let a = arena.allocate_chunk(3);
        let b = arena.allocate_chunk(20);
        let c = arena.allocate_chunk(1);

        assert_eq!(a, 0);
        assert_eq!(b, 16);
        assert_eq!(c, 48);
        assert_eq!(arena.used_words(), 49);
    }

    #[test]
    fn mapped_view_has_requested_length() {
        let mut arena = UniformArena::new(BufferHandle::new(1));
        let off = arena.allocate_chunk(16);
        let view = arena.map_buffer_f32(off, 16);
        assert_eq!(view.len(), 16);
        view[15] = 2.5;
        assert_eq!(arena.as_bytes().len(), 16 * 4);
    }

    #[test]
    fn reset_rewinds_but_keeps_storage() {
        let mut arena = UniformArena::new(BufferHandle::new(1));
        arena.allocate_chunk(100);
        let cap = arena.capacity_words();

        arena.reset();
        assert_eq!(arena.used_words(), 0);
        assert_eq!(arena.capacity_words(), cap);
        assert_eq!(arena.allocate_chunk(4), 0);
    }

    #[test]
    #[should_panic]
    fn non_power_of_two_alignment_is_rejected() {
        let _ = UniformArena::with_alignment(BufferHandle::new(1), 3);
    }
}
