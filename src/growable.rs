/// Amortized-growth backing store for ID lists (tidsets, diffsets) and Nlist triples.
///
/// Unlike `Vec`, growth is explicit: when full, capacity becomes `floor(capacity * 1.75) + 1`
/// (never less than what is needed), and `shrink_to_fit` trims to the exact size once the
/// caller knows no more elements will arrive.
#[derive(Clone)]
pub struct GrowableArray<T: Copy> {
    data: Vec<T>,
}

const GROWTH_RATE: f64 = 1.75;
const INITIAL_CAPACITY: usize = 16;

/// Capacity after growing from `capacity` to hold at least `needed` elements.
#[inline]
pub(crate) fn grown_capacity(capacity: usize, needed: usize) -> usize {
    let grown = (capacity as f64 * GROWTH_RATE) as usize + 1;
    grown.max(needed)
}

impl<T: Copy> GrowableArray<T> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GrowableArray {
            data: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn grow_for(&mut self, needed: usize) {
        if needed > self.data.capacity() {
            let target = grown_capacity(self.data.capacity(), needed);
            self.data.reserve_exact(target - self.data.len());
        }
    }

    #[inline]
    pub fn add(&mut self, value: T) {
        self.grow_for(self.data.len() + 1);
        self.data.push(value);
    }

    /// Caller guarantees `index < size()`.
    #[inline(always)]
    pub fn get(&self, index: usize) -> T {
        self.data[index]
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    pub fn append_all(&mut self, other: &GrowableArray<T>) {
        self.grow_for(self.data.len() + other.size());
        self.data.extend_from_slice(other.as_slice());
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: Copy> Default for GrowableArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality is on contents only; capacity is an allocation detail.
impl<T: Copy + PartialEq> PartialEq for GrowableArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Copy + Eq> Eq for GrowableArray<T> {}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for GrowableArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.data.iter()).finish()
    }
}

impl<T: Copy> FromIterator<T> for GrowableArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = GrowableArray::new();
        for value in iter {
            array.add(value);
        }
        array
    }
}

impl<T: Copy> From<Vec<T>> for GrowableArray<T> {
    fn from(data: Vec<T>) -> Self {
        GrowableArray { data }
    }
}

impl<'a, T: Copy> IntoIterator for &'a GrowableArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
