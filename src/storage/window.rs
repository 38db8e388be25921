/// Fixed-capacity circular buffer of samples
///
/// The cursor always points at the next slot to overwrite; the most recent
/// sample sits one slot behind it. The oldest sample is silently replaced
/// once the window is full.
#[derive(Debug, Clone)]
pub struct SampleWindow<T, const N: usize> {
    slots: [T; N],
    cursor: usize,
    samples_seen: u32,
}

impl<T: Copy + Default, const N: usize> Default for SampleWindow<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> SampleWindow<T, N> {
    pub fn new() -> Self {
        Self {
            slots: [T::default(); N],
            cursor: 0,
            samples_seen: 0,
        }
    }

    pub fn push(&mut self, sample: T) {
        self.slots[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % N;
        self.samples_seen = self.samples_seen.saturating_add(1);
    }

    /// Slot holding the most recent sample.
    pub fn latest_index(&self) -> usize {
        (self.cursor + N - 1) % N
    }

    pub fn latest(&self) -> Option<&T> {
        if self.samples_seen == 0 {
            None
        } else {
            Some(&self.slots[self.latest_index()])
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total samples written since start-up, saturating.
    pub fn samples_seen(&self) -> u32 {
        self.samples_seen
    }

    /// `true` until the window has been filled once.
    pub fn warming_up(&self) -> bool {
        (self.samples_seen as usize) < N
    }

    /// Slots that hold real samples, in slot order (not time order).
    ///
    /// Before the first wrap these are exactly the slots written so far.
    pub fn filled(&self) -> &[T] {
        let len = (self.samples_seen as usize).min(N);
        &self.slots[..len]
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}
