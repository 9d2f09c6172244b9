//! Random-number generator and the fill/compare pattern engine.
//!
//! The PRNG is the original's fixed 32-bit multiply-with-carry generator,
//! not the `rand` crate: the whole point is bit-for-bit reproducibility
//! from a documented seed, which an ecosystem RNG does not promise across
//! versions.

use crate::error::{DiagError, DiagResult};

pub const SECTOR_SIZE: usize = 512;

#[derive(Debug, Clone, Copy)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Rng { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn reseed(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Next 32-bit value from the multiply-with-carry recurrence.
    pub fn next_u32(&mut self) -> u32 {
        let tmp = 33614u64 * self.seed as u64;
        let q = (tmp as u32) >> 1;
        let p = (tmp >> 32) as u32;
        let mut mlcg = p.wrapping_add(q);
        if mlcg & 0x8000_0000 != 0 {
            mlcg &= 0x7fff_ffff;
            mlcg = mlcg.wrapping_add(1);
        }
        self.seed = mlcg;
        mlcg
    }

    /// Next non-negative 64-bit value: two 32-bit draws concatenated, with
    /// the top bit of the high word masked off.
    pub fn next_i64(&mut self) -> i64 {
        let hi = (self.next_u32() & 0x7fff_ffff) as i64;
        let lo = self.next_u32() as i64;
        (hi << 32) | lo
    }
}

/// Fill `buf[0..512*len_sectors)` with the named pattern. `rng` is used
/// (and reseeded to 42 per sector) only by the `rand` pattern; callers
/// bracket the save/reset(42)/restore of the interpreter's persistent seed
/// around this call so sequences outside the command are unaffected.
pub fn fill(buf: &mut [u8], pattern: &str, val: i64, len_sectors: usize, rng: &mut Rng) -> DiagResult<()> {
    let span = SECTOR_SIZE * len_sectors;
    match pattern {
        "cnt" => {
            for (i, b) in buf[..span].iter_mut().enumerate() {
                *b = (i & 0xff) as u8;
            }
        }
        "dwcnt" => {
            let mut l: u32 = 0;
            for chunk in buf[..span].chunks_exact_mut(4) {
                chunk.copy_from_slice(&l.to_be_bytes());
                l = l.wrapping_add(1);
            }
        }
        "val" => {
            let v = val as u32;
            for chunk in buf[..span].chunks_exact_mut(4) {
                chunk.copy_from_slice(&v.to_be_bytes());
            }
        }
        "rand" => {
            for sector in buf[..span].chunks_exact_mut(SECTOR_SIZE) {
                rng.reseed(42);
                for b in sector.iter_mut() {
                    *b = (rng.next_i64() & 0xff) as u8;
                }
            }
        }
        "lba" => {
            let mut v = val as u32;
            for sector in buf[..span].chunks_exact_mut(SECTOR_SIZE) {
                sector[0..4].copy_from_slice(&v.to_be_bytes());
                v = v.wrapping_add(1);
            }
        }
        _ => return Err(DiagError::UnknownPattern(pattern.to_string())),
    }
    Ok(())
}

/// True for every name `pattn`/`comp` accept, so the dispatcher can
/// validate `buffs` (compare-only) separately.
pub fn is_fill_pattern(pattern: &str) -> bool {
    matches!(pattern, "cnt" | "dwcnt" | "val" | "rand" | "lba")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    All,
    One,
    Fail,
}

/// Byte-for-byte miscompare accounting shared by `comp` across a whole
/// command invocation: folds runs of identical (actual, expected) pairs
/// into a tally instead of printing each one.
#[derive(Debug, Default)]
pub struct CompareState {
    first: bool,
    dataset: bool,
    comp_a: u8,
    comp_b: u8,
    repcnt: u32,
}

pub struct Observation {
    pub messages: Vec<String>,
    pub abort: bool,
}

impl CompareState {
    pub fn new() -> Self {
        CompareState {
            first: true,
            dataset: false,
            comp_a: 0,
            comp_b: 0,
            repcnt: 0,
        }
    }

    /// Reset at the start of every `comp` invocation.
    pub fn reset_for_run(&mut self) {
        self.first = true;
        self.dataset = false;
        self.repcnt = 0;
    }

    pub fn observe(&mut self, addr: usize, actual: u8, expected: u8, mode: CompareMode) -> Observation {
        let mut messages = Vec::new();
        let mut abort = false;
        if actual != expected {
            if self.first || mode == CompareMode::All {
                if self.dataset && actual == self.comp_a && expected == self.comp_b {
                    self.repcnt += 1;
                } else {
                    if let Some(tally) = self.flush_tally() {
                        messages.push(tally);
                    }
                    messages.push(format!(
                        "*** Error: Buffer miscompare: {:08x}: {:02x} s/b {:02x}",
                        addr, actual, expected
                    ));
                }
            }
            self.first = false;
            if mode == CompareMode::Fail {
                abort = true;
                return Observation { messages, abort };
            }
            self.comp_a = actual;
            self.comp_b = expected;
            self.dataset = true;
        }
        Observation { messages, abort }
    }

    /// Repeat count left over once a `comp` invocation finishes, for the
    /// closing tally line (distinct wording from the in-loop flush).
    pub fn take_repcnt(&mut self) -> u32 {
        let n = self.repcnt;
        self.repcnt = 0;
        n
    }

    pub fn flush_tally(&mut self) -> Option<String> {
        if self.repcnt > 0 {
            let n = self.repcnt;
            self.repcnt = 0;
            Some(format!(
                "*** Info: There were {} occurrances of the above mismatch",
                n
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand32_matches_known_sequence_from_seed_one() {
        let mut rng = Rng::new(1);
        let first = rng.next_u32();
        let second = rng.next_u32();
        assert_ne!(first, second);
        assert_eq!(first, {
            let tmp = 33614u64 * 1u64;
            let q = (tmp as u32) >> 1;
            let p = (tmp >> 32) as u32;
            let mut mlcg = p.wrapping_add(q);
            if mlcg & 0x8000_0000 != 0 {
                mlcg &= 0x7fff_ffff;
                mlcg = mlcg.wrapping_add(1);
            }
            mlcg
        });
    }

    #[test]
    fn rand_pattern_is_deterministic_per_sector() {
        let mut buf = vec![0u8; SECTOR_SIZE * 2];
        let mut rng = Rng::new(1);
        fill(&mut buf, "rand", 0, 2, &mut rng).unwrap();
        assert_eq!(&buf[0..SECTOR_SIZE], &buf[SECTOR_SIZE..2 * SECTOR_SIZE]);
    }

    #[test]
    fn cnt_pattern_wraps_at_256() {
        let mut buf = vec![0u8; SECTOR_SIZE];
        let mut rng = Rng::new(1);
        fill(&mut buf, "cnt", 0, 1, &mut rng).unwrap();
        assert_eq!(buf[0], 0);
        assert_eq!(buf[255], 255);
        assert_eq!(buf[256], 0);
    }

    #[test]
    fn val_pattern_dumps_big_endian_repeating() {
        let mut buf = vec![0u8; SECTOR_SIZE * 2];
        let mut rng = Rng::new(1);
        fill(&mut buf, "val", 0x1122_3344, 2, &mut rng).unwrap();
        assert_eq!(&buf[0..16], &[0x11, 0x22, 0x33, 0x44, 0x11, 0x22, 0x33, 0x44, 0x11, 0x22, 0x33, 0x44, 0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn compare_folds_repeated_mismatches() {
        let mut cs = CompareState::new();
        cs.reset_for_run();
        let o1 = cs.observe(0, 0xaa, 0x00, CompareMode::All);
        assert_eq!(o1.messages.len(), 1);
        let o2 = cs.observe(1, 0xaa, 0x00, CompareMode::All);
        assert!(o2.messages.is_empty());
        let tally = cs.flush_tally().unwrap();
        assert!(tally.contains('1'));
    }

    #[test]
    fn fail_mode_aborts_on_first_mismatch() {
        let mut cs = CompareState::new();
        cs.reset_for_run();
        let o = cs.observe(0, 1, 2, CompareMode::Fail);
        assert!(o.abort);
    }
}
