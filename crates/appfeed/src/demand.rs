//! Consumer-declared capacity for pending deliveries.

use std::cmp::Ordering;
use std::ops::{Add, AddAssign};

/// How many further values a subscriber is willing to accept.
///
/// Merging demands saturates rather than overflows, and `Unlimited` absorbs
/// everything merged into it. Consuming one unit at zero is a no-op, so the
/// counter can never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
	/// At most this many further deliveries.
	Limited(u64),
	/// No delivery bound.
	Unlimited,
}

impl Demand {
	/// No capacity for any delivery.
	pub const NONE: Self = Self::Limited(0);

	pub const fn limited(count: u64) -> Self {
		Self::Limited(count)
	}

	/// Whether no further delivery is currently allowed.
	pub const fn is_none(self) -> bool {
		matches!(self, Self::Limited(0))
	}

	/// Consume capacity for a single delivery.
	///
	/// Returns `false` and leaves the counter untouched when demand is
	/// exhausted. `Unlimited` always permits delivery without decrementing.
	pub fn consume_one(&mut self) -> bool {
		match self {
			Self::Limited(0) => false,
			Self::Limited(count) => {
				*count -= 1;
				true
			}
			Self::Unlimited => true,
		}
	}
}

impl Add for Demand {
	type Output = Self;

	fn add(self, rhs: Self) -> Self {
		match (self, rhs) {
			(Self::Unlimited, _) | (_, Self::Unlimited) => Self::Unlimited,
			(Self::Limited(a), Self::Limited(b)) => Self::Limited(a.saturating_add(b)),
		}
	}
}

impl AddAssign for Demand {
	fn add_assign(&mut self, rhs: Self) {
		*self = *self + rhs;
	}
}

impl Ord for Demand {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Self::Unlimited, Self::Unlimited) => Ordering::Equal,
			(Self::Unlimited, Self::Limited(_)) => Ordering::Greater,
			(Self::Limited(_), Self::Unlimited) => Ordering::Less,
			(Self::Limited(a), Self::Limited(b)) => a.cmp(b),
		}
	}
}

impl PartialOrd for Demand {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
