use crate::record::Record;

/// Records waiting for the next chunk flush.
#[derive(Debug)]
pub struct RecordBuffer {
    records: Vec<Record>,
    capacity: usize,
}

impl RecordBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Add a record; callers flush as soon as [`is_full`](Self::is_full) holds.
    pub fn push(&mut self, record: Record) {
        debug_assert!(self.records.len() < self.capacity, "buffer overfilled");
        self.records.push(record);
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    #[test]
    fn fills_to_capacity_and_clears() {
        let mut buffer = RecordBuffer::new(2);
        buffer.push(vec![Value::UInt(1)]);
        assert!(!buffer.is_full());
        buffer.push(vec![Value::UInt(2)]);
        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 2);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 2);
    }
}
