//! Common functions.

use std::hash::{Hash, Hasher};
use std::time;

#[cfg(not(test))]
#[macro_export]
macro_rules! log {
    (trace, $($arg:expr),*) => { log::trace!($($arg),*) };
    (debug, $($arg:expr),*) => { log::debug!($($arg),*) };
    (info, $($arg:expr),*) => { log::info!($($arg),*) };
    (warn, $($arg:expr),*) => { log::warn!($($arg),*) };
    (error, $($arg:expr),*) => { log::error!($($arg),*) };
}

#[cfg(test)]
#[macro_export]
macro_rules! log {
    (trace, $($arg:expr),*) => { println!($($arg),*) };
    (debug, $($arg:expr),*) => { println!($($arg),*) };
    (info, $($arg:expr),*) => { println!($($arg),*) };
    (warn, $($arg:expr),*) => { println!($($arg),*) };
    (error, $($arg:expr),*) => { println!($($arg),*) };
}

#[inline]
pub fn format_time(secs: u64) -> String {
    let mut s = secs;
    let mut m = s / 60;
    let h = m / 60;
    s %= 60;
    m %= 60;
    format!("[{h:02}:{m:02}:{s:02}]")
}

#[inline]
pub fn format_count(c: usize) -> String {
    if c > 1000000000 {
        let f = c / 10000000;
        format!("{:.2}b", f as f32 / 100.0)
    } else if c > 1000000 {
        let f = c / 10000;
        format!("{:.2}m", f as f32 / 100.0)
    } else if c > 1000 {
        let f = c / 10;
        format!("{:.2}k", f as f32 / 100.0)
    } else {
        format!("{c}")
    }
}

/// Stable fingerprint of a hashable value, used to cache oracle verdicts.
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Default, Debug)]
pub struct TimeUsage {
    total: u128,
    num: u64,
}

impl TimeUsage {
    pub fn count(&mut self) -> TimeCounter {
        TimeCounter {
            t: time::Instant::now(),
            usage: self,
        }
    }

    pub fn add_time(&mut self, t: &time::Instant) {
        self.total += t.elapsed().as_micros();
        self.num += 1;
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn format(&self) -> String {
        format_time((self.total / 1_000_000) as u64)
    }

    pub fn avg_micro(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            (self.total / self.num as u128) as f64
        }
    }

    pub fn avg_ms(&self) -> String {
        let avg = self.avg_micro() / 1000.0;
        format!("{avg:.2}ms")
    }
}

pub struct TimeCounter<'a> {
    pub t: time::Instant,
    pub usage: &'a mut TimeUsage,
}

impl<'a> Drop for TimeCounter<'a> {
    fn drop(&mut self) {
        self.usage.add_time(&self.t);
    }
}

#[test]
fn test_format() {
    assert_eq!(format_time(3725), "[01:02:05]");
    assert_eq!(format_count(999), "999");
    assert_eq!(format_count(12345), "12.34k");
    assert_eq!(fingerprint("abc"), fingerprint("abc"));
    assert_ne!(fingerprint("abc"), fingerprint("abd"));
}
