use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub chromatograms: usize,
    pub mobilograms: usize,
    pub points: usize,
    pub gap_filled: usize,
    pub out_of_range: usize,
    pub failed: usize,
}

impl ProgressRecord {
    pub fn features(&self) -> usize {
        self.chromatograms + self.mobilograms
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.chromatograms += rhs.chromatograms;
        self.mobilograms += rhs.mobilograms;
        self.points += rhs.points;
        self.gap_filled += rhs.gap_filled;
        self.out_of_range += rhs.out_of_range;
        self.failed += rhs.failed;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::add)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accumulate() {
        let a = ProgressRecord {
            chromatograms: 2,
            points: 10,
            ..Default::default()
        };
        let b = ProgressRecord {
            mobilograms: 1,
            points: 4,
            failed: 1,
            ..Default::default()
        };
        let total: ProgressRecord = [a, b, ProgressRecord::default()].into_iter().sum();
        assert_eq!(total.features(), 3);
        assert_eq!(total.points, 14);
        assert_eq!(total.failed, 1);
    }
}
