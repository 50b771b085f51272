// src/buffer.rs
//
// Fixed-capacity sliding window, one ring per channel plus a time ring.
// All rings share head/len so slot i of every ring belongs to the same sample.

use crate::channel::CHANNEL_COUNT;
use crate::frame::Sample;

pub struct WindowBuffer {
    capacity: usize,
    head: usize,
    len: usize,
    times: Vec<f64>,
    channels: [Vec<i32>; CHANNEL_COUNT],
}

/// Ordered copy of the window, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    pub times: Vec<f64>,
    pub channels: [Vec<i32>; CHANNEL_COUNT],
}

impl WindowSnapshot {
    pub fn latest_time(&self) -> Option<f64> {
        self.times.last().copied()
    }
}

impl WindowBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            head: 0,
            len: 0,
            times: vec![0.0; capacity],
            channels: std::array::from_fn(|_| vec![0; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Append one sample; when full, the oldest sample is overwritten.
    pub fn append(&mut self, sample: &Sample) {
        let slot = if self.len < self.capacity {
            let slot = (self.head + self.len) % self.capacity;
            self.len += 1;
            slot
        } else {
            let slot = self.head;
            self.head = (self.head + 1) % self.capacity;
            slot
        };

        self.times[slot] = sample.elapsed_s;
        for (ring, value) in self.channels.iter_mut().zip(sample.values) {
            ring[slot] = value;
        }
    }

    fn slot(&self, i: usize) -> usize {
        (self.head + i) % self.capacity
    }

    fn sample_at(&self, i: usize) -> Sample {
        let slot = self.slot(i);
        Sample::new(
            self.times[slot],
            std::array::from_fn(|ch| self.channels[ch][slot]),
        )
    }

    pub fn latest(&self) -> Option<Sample> {
        (self.len > 0).then(|| self.sample_at(self.len - 1))
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let times = (0..self.len).map(|i| self.times[self.slot(i)]).collect();
        let channels = std::array::from_fn(|ch| {
            (0..self.len)
                .map(|i| self.channels[ch][self.slot(i)])
                .collect()
        });
        WindowSnapshot { times, channels }
    }
}

#[cfg(test)]
impl WindowBuffer {
    pub fn oldest(&self) -> Option<Sample> {
        (self.len > 0).then(|| self.sample_at(0))
    }

    /// Iterate samples oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.len).map(move |i| self.sample_at(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, base: i32) -> Sample {
        Sample::new(t, [base, base + 1, base + 2, base + 3])
    }

    #[test]
    fn starts_empty() {
        let buf = WindowBuffer::new(5);
        assert_eq!(buf.len(), 0);
        assert!(buf.snapshot().times.is_empty());
        assert_eq!(buf.latest(), None);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = WindowBuffer::new(0);
        buf.append(&sample(1.0, 0));
        buf.append(&sample(2.0, 10));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest(), Some(sample(2.0, 10)));
    }

    #[test]
    fn fills_up_to_capacity_then_evicts_oldest() {
        let n = 4;
        let mut buf = WindowBuffer::new(n);
        for i in 0..n {
            buf.append(&sample(i as f64, i as i32 * 10));
        }
        assert_eq!(buf.len(), n);
        assert_eq!(buf.oldest(), Some(sample(0.0, 0)));

        buf.append(&sample(4.0, 40));
        assert_eq!(buf.len(), n);
        assert_eq!(buf.oldest(), Some(sample(1.0, 10)));
        assert!(buf.iter().all(|s| s.elapsed_s != 0.0));
    }

    #[test]
    fn sequences_stay_synchronized_across_wraparound() {
        let mut buf = WindowBuffer::new(3);
        for i in 0..11 {
            buf.append(&sample(i as f64, i * 100));
        }
        let snap = buf.snapshot();
        assert_eq!(snap.times, vec![8.0, 9.0, 10.0]);
        assert_eq!(snap.channels[0], vec![800, 900, 1000]);
        assert_eq!(snap.channels[3], vec![803, 903, 1003]);
        for ch in &snap.channels {
            assert_eq!(ch.len(), snap.times.len());
        }
    }

    #[test]
    fn sixty_frames_into_fifty_slots_keep_the_last_fifty() {
        let mut buf = WindowBuffer::new(50);
        for i in 1..=60 {
            buf.append(&Sample::new(i as f64, [100, 200, 300, 400]));
        }
        let snap = buf.snapshot();
        assert_eq!(snap.times.len(), 50);
        let expected: Vec<f64> = (11..=60).map(|i| i as f64).collect();
        assert_eq!(snap.times, expected);
        assert!(snap.channels[1].iter().all(|&v| v == 200));
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let mut buf = WindowBuffer::new(2);
        buf.append(&sample(1.0, 1));
        let first = buf.snapshot();
        let second = buf.snapshot();
        assert_eq!(first, second);
        assert_eq!(buf.len(), 1);
    }
}
