//! Recursive radix-2 transform over the Fermat ring.
//!
//! Elements are stored back to back in flat word slices, `n + 1` words per
//! element. The root of unity at recursion order `size` is
//! `√2^((4·n·64) >> size)`, so every twiddle multiplication is a
//! [`FermatOps::shift_half`].

use fibcalc_memory::MemoryPools;
use tracing::trace;

use crate::context::Interrupt;
use crate::error::{FftError, Result};
use crate::fermat::{FermatOps, WORD_BITS};
use crate::parallel::{RecursionGate, WorkerSlots};

/// Direction of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Evaluate at powers of ω.
    Forward,
    /// Evaluate at powers of ω⁻¹ (unscaled).
    Backward,
}

/// Everything one transform needs besides its buffers.
pub(crate) struct Fourier<'a> {
    pub ops: &'a FermatOps,
    pub pools: &'a MemoryPools,
    pub slots: &'a WorkerSlots,
    pub gate: RecursionGate,
    pub interrupt: &'a dyn Interrupt,
    /// Ring width in words.
    pub n: usize,
    /// Transform order.
    pub k: u32,
}

impl Fourier<'_> {
    fn width(&self) -> usize {
        self.n + 1
    }

    /// Transform the `2^k` elements of `src` into `dst`.
    pub fn run(&self, dst: &mut [u64], src: &[u64], direction: Direction) -> Result<()> {
        let expected = self.width() << self.k;
        if dst.len() != expected || src.len() != expected {
            return Err(FftError::fault(format!(
                "transform buffers hold {}/{} words, expected {expected}",
                dst.len(),
                src.len()
            )));
        }
        self.rec(dst, src, 0, self.k, 0, direction)
    }

    /// Inverse transform: backward pass, then divide every element by 2^k.
    pub fn inverse(&self, dst: &mut [u64], src: &[u64]) -> Result<()> {
        self.run(dst, src, Direction::Backward)?;
        let w = self.width();
        let mut tmp = self.pools.fermat().acquire(w);
        for elem in dst.chunks_exact_mut(w) {
            self.ops.shift(&mut tmp, elem, -i64::from(self.k));
            elem.copy_from_slice(&tmp);
        }
        self.pools.fermat().release(tmp);
        Ok(())
    }

    fn src_elem<'s>(&self, src: &'s [u64], index: usize) -> &'s [u64] {
        let w = self.width();
        &src[index * w..(index + 1) * w]
    }

    // Source element j of this sub-transform lives at `base + (j << (k - size))`.
    #[allow(clippy::cast_possible_wrap)]
    fn rec(
        &self,
        dst: &mut [u64],
        src: &[u64],
        base: usize,
        size: u32,
        depth: u32,
        direction: Direction,
    ) -> Result<()> {
        let w = self.width();
        let idx_shift = self.k - size;
        match size {
            0 => {
                dst.copy_from_slice(self.src_elem(src, base));
                return Ok(());
            }
            1 => {
                let a = self.src_elem(src, base);
                let b = self.src_elem(src, base + (1 << idx_shift));
                let (d0, d1) = dst.split_at_mut(w);
                self.ops.add(d0, a, b);
                self.ops.sub(d1, a, b);
                return Ok(());
            }
            _ => {}
        }

        if self.interrupt.is_interrupted() {
            return Err(FftError::Cancelled);
        }

        let half = w << (size - 1);
        let (dst1, dst2) = dst.split_at_mut(half);
        let odd_base = base + (1 << idx_shift);

        let forked = if self.gate.allows(size, depth) {
            self.slots.try_acquire().map(|_guard| {
                trace!(size, depth, "forking transform halves");
                let (ra, rb) = rayon::join(
                    || self.rec(dst1, src, base, size - 1, depth + 1, direction),
                    || self.rec(dst2, src, odd_base, size - 1, depth + 1, direction),
                );
                ra.and(rb)
            })
        } else {
            None
        };
        match forked {
            Some(result) => result?,
            None => {
                self.rec(dst1, src, base, size - 1, depth + 1, direction)?;
                self.rec(dst2, src, odd_base, size - 1, depth + 1, direction)?;
            }
        }

        let mut omega2shift = ((4 * self.n * WORD_BITS) >> size) as i64;
        if direction == Direction::Backward {
            omega2shift = -omega2shift;
        }
        let fermat = self.pools.fermat();
        let mut tmp = fermat.acquire(w);
        let mut tmp2 = fermat.acquire(w);
        // dst[i] = Q1(ω^i) + ω^i·Q2(ω^i), dst[i + half] = Q1(ω^i) - ω^i·Q2(ω^i)
        for (i, (lo, hi)) in dst1
            .chunks_exact_mut(w)
            .zip(dst2.chunks_exact_mut(w))
            .enumerate()
        {
            self.ops
                .shift_half(&mut tmp, hi, i as i64 * omega2shift, &mut tmp2);
            self.ops.sub(hi, lo, &tmp);
            self.ops.add_assign(lo, &tmp);
        }
        fermat.release(tmp);
        fermat.release(tmp2);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NeverInterrupt;
    use crate::kernels::Kernels;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        ops: FermatOps,
        pools: MemoryPools,
        slots: WorkerSlots,
    }

    impl Fixture {
        fn new(slots: usize) -> Self {
            Self {
                ops: FermatOps::new(Kernels::portable(), 30),
                pools: MemoryPools::default(),
                slots: WorkerSlots::new(slots),
            }
        }

        fn fourier<'a>(&'a self, n: usize, k: u32, interrupt: &'a dyn Interrupt) -> Fourier<'a> {
            Fourier {
                ops: &self.ops,
                pools: &self.pools,
                slots: &self.slots,
                gate: RecursionGate {
                    min_log_size: 2,
                    max_depth: 4,
                },
                interrupt,
                n,
                k,
            }
        }
    }

    fn input(n: usize, k: u32, seed: u64) -> Vec<u64> {
        let w = n + 1;
        let mut s = seed | 1;
        let mut v = vec![0u64; w << k];
        for elem in v.chunks_exact_mut(w) {
            // Half-width coefficients like a real operand split.
            for word in &mut elem[..n / 2] {
                s ^= s << 13;
                s ^= s >> 7;
                s ^= s << 17;
                *word = s;
            }
        }
        v
    }

    // X_j = Σ_i x_i · ω^(ij), evaluated element by element.
    #[allow(clippy::cast_possible_wrap)]
    fn naive_forward(ops: &FermatOps, src: &[u64], n: usize, k: u32) -> Vec<u64> {
        let w = n + 1;
        let len = 1usize << k;
        let omega2shift = ((4 * n * WORD_BITS) >> k) as i64;
        let mut out = vec![0u64; w << k];
        let mut term = vec![0u64; w];
        let mut tmp = vec![0u64; w];
        for j in 0..len {
            let acc = &mut out[j * w..(j + 1) * w];
            for i in 0..len {
                let x = &src[i * w..(i + 1) * w];
                ops.shift_half(&mut term, x, (i * j) as i64 * omega2shift, &mut tmp);
                ops.add_assign(acc, &term);
            }
        }
        out
    }

    #[test]
    fn forward_matches_naive_dft() {
        let fx = Fixture::new(0);
        for (n, k) in [(4usize, 2u32), (4, 3), (8, 4)] {
            let src = input(n, k, 7);
            let mut dst = vec![0u64; (n + 1) << k];
            fx.fourier(n, k, &NeverInterrupt)
                .run(&mut dst, &src, Direction::Forward)
                .unwrap();
            assert_eq!(dst, naive_forward(&fx.ops, &src, n, k), "n={n} k={k}");
        }
    }

    #[test]
    fn inverse_undoes_forward() {
        let fx = Fixture::new(4);
        for (n, k) in [(2usize, 1u32), (4, 3), (16, 6), (64, 8)] {
            let src = input(n, k, 99);
            let f = fx.fourier(n, k, &NeverInterrupt);
            let mut values = vec![0u64; src.len()];
            let mut back = vec![0u64; src.len()];
            f.run(&mut values, &src, Direction::Forward).unwrap();
            f.inverse(&mut back, &values).unwrap();
            assert_eq!(back, src, "n={n} k={k}");
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let (n, k) = (32usize, 7u32);
        let src = input(n, k, 3);
        let seq = Fixture::new(0);
        let par = Fixture::new(8);
        let mut a = vec![0u64; src.len()];
        let mut b = vec![0u64; src.len()];
        seq.fourier(n, k, &NeverInterrupt)
            .run(&mut a, &src, Direction::Forward)
            .unwrap();
        par.fourier(n, k, &NeverInterrupt)
            .run(&mut b, &src, Direction::Forward)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(par.slots.in_use(), 0);
    }

    #[test]
    fn interrupt_cancels() {
        struct Flag(AtomicBool);
        impl Interrupt for Flag {
            fn is_interrupted(&self) -> bool {
                self.0.load(Ordering::Relaxed)
            }
        }
        let fx = Fixture::new(2);
        let flag = Flag(AtomicBool::new(true));
        let (n, k) = (8usize, 4u32);
        let src = input(n, k, 1);
        let mut dst = vec![0u64; src.len()];
        let err = fx
            .fourier(n, k, &flag)
            .run(&mut dst, &src, Direction::Forward)
            .unwrap_err();
        assert_eq!(err, FftError::Cancelled);
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let fx = Fixture::new(0);
        let src = vec![0u64; 10];
        let mut dst = vec![0u64; 10];
        let err = fx
            .fourier(4, 2, &NeverInterrupt)
            .run(&mut dst, &src, Direction::Forward)
            .unwrap_err();
        assert!(matches!(err, FftError::InternalFault(_)));
    }
}
