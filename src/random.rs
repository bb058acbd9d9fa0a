use crate::{
    context::{Context, DataPlugin},
    hashing::{hash_str, mix_seed},
    trace,
    trait_map::TraitMap,
};
use rand::{
    distr::uniform::{SampleRange, SampleUniform},
    prelude::Distribution,
    rngs::StdRng,
    seq::SliceRandom,
    Rng, SeedableRng,
};
use rand_distr::Exp;
use std::any::Any;

/// Identifies a named random number stream. Use [`define_rng!`](crate::define_rng) to declare one.
pub trait RngId: Any {
    #![allow(non_upper_case_globals)]
    const new: &'static dyn Fn(u64) -> Self;
    const name: &'static str;
    type RngType: SeedableRng;
    fn rng(&mut self) -> &mut Self::RngType;
}

struct RngPlugin {
    base_seed: u64,
    rng_map: TraitMap,
}

impl RngPlugin {
    fn clear(&mut self) {
        self.rng_map.clear();
    }

    fn stream_seed<R: RngId>(&self) -> u64 {
        self.base_seed.wrapping_add(hash_str(R::name))
    }

    pub fn get_rng<R: RngId>(&mut self) -> &mut R::RngType {
        let seed = self.stream_seed::<R>();
        self.rng_map.get_or_insert_with(|| R::new(seed)).rng()
    }
}

impl DataPlugin for RngPlugin {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &|| RngPlugin {
        base_seed: 0,
        rng_map: TraitMap::new(),
    };
}

/// Gets a mutable reference to the random number generator associated with the given
/// `RngId`.
// This is a private free function so that it's not leaked to the public API.
fn get_rng<R: RngId>(context: &mut Context) -> &mut R::RngType {
    let rng_container = context.get_data_container_mut::<RngPlugin>();

    rng_container.get_rng::<R>()
}

pub trait ContextRandomExt {
    fn init_random(&mut self, base_seed: u64);

    fn base_seed(&self) -> u64;

    /// Gets a random sample from the random number generator associated with the given
    /// `RngId` by applying the specified sampler function. If the Rng has not been used
    /// before, one will be created with the base seed you defined in `init_random`.
    fn sample<R: RngId + 'static, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample from the specified distribution using a random number generator
    /// associated with the given `RngId`.
    fn sample_distr<R: RngId + 'static, T>(&mut self, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng;

    /// Gets a random sample within the range provided by `range`
    /// using the generator associated with the given `RngId`.
    fn sample_range<R: RngId + 'static, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform;

    /// Returns an independent generator for slot `index` of the stream `R`.
    ///
    /// The generator depends only on the base seed, the stream name and `index`, never on how
    /// much of the stream has been consumed. Work that is split across threads (one slot per
    /// group, per day) stays reproducible regardless of scheduling.
    fn derived_rng<R: RngId + 'static>(&self, index: u64) -> StdRng;
}

impl ContextRandomExt for Context {
    /// Initializes the `RngPlugin` data container to store rngs as well as a base
    /// seed. Note that rngs are created lazily when `get_rng` is called.
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with seed {base_seed}");
        let rng_container = self.get_data_container_mut::<RngPlugin>();
        rng_container.base_seed = base_seed;

        // Clear any existing Rngs to ensure they get re-seeded when `get_rng` is called
        rng_container.clear();
    }

    fn base_seed(&self) -> u64 {
        self.get_data_container::<RngPlugin>()
            .map_or(0, |plugin| plugin.base_seed)
    }

    fn sample<R: RngId + 'static, T>(&mut self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let rng = get_rng::<R>(self);
        sampler(rng)
    }

    fn sample_distr<R: RngId + 'static, T>(&mut self, distribution: impl Distribution<T>) -> T
    where
        R::RngType: Rng,
    {
        let rng = get_rng::<R>(self);
        distribution.sample::<R::RngType>(rng)
    }

    fn sample_range<R: RngId + 'static, S, T>(&mut self, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample::<R, T>(|rng| rng.random_range(range))
    }

    fn derived_rng<R: RngId + 'static>(&self, index: u64) -> StdRng {
        let stream_seed = self.base_seed().wrapping_add(hash_str(R::name));
        StdRng::seed_from_u64(mix_seed(stream_seed, index))
    }
}

/// Returns the index of the first cumulative weight exceeding `r`. Rounding in the weights can
/// leave `r` above every entry; the last index is returned then.
pub fn draw_from_distribution(cumulative: &[f64], r: f64) -> usize {
    debug_assert!(!cumulative.is_empty());
    cumulative
        .iter()
        .position(|&weight| weight > r)
        .unwrap_or(cumulative.len().saturating_sub(1))
}

/// Draws an index from a cumulative weight array.
pub fn sample_cumulative<R: Rng + ?Sized>(rng: &mut R, cumulative: &[f64]) -> usize {
    draw_from_distribution(cumulative, rng.random::<f64>())
}

/// Rounds `value` down, then adds one with probability equal to the fractional part.
pub fn probabilistic_round<R: Rng + ?Sized>(rng: &mut R, value: f64) -> usize {
    if value <= 0.0 {
        return 0;
    }
    let whole = value.floor();
    let mut count = whole as usize;
    if rng.random::<f64>() < value - whole {
        count += 1;
    }
    count
}

/// Draws from an exponential distribution with the given rate. Returns `None` for a rate that
/// does not describe a distribution.
pub fn draw_exponential<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> Option<f64> {
    Exp::new(rate).ok().map(|exp| exp.sample(rng))
}

/// Returns `0..n` in random order.
pub fn shuffled_indices<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
}

#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        struct $random_id {
            rng: $crate::rand::rngs::StdRng,
        }

        impl $crate::random::RngId for $random_id {
            #![allow(non_upper_case_globals)]
            type RngType = $crate::rand::rngs::StdRng;
            const name: &'static str = stringify!($random_id);
            const new: &'static dyn Fn(u64) -> Self = &|seed| {
                use $crate::rand::SeedableRng;
                Self {
                    rng: $crate::rand::rngs::StdRng::seed_from_u64(seed),
                }
            };

            fn rng(&mut self) -> &mut Self::RngType {
                &mut self.rng
            }
        }
    };
}
#[allow(unused_imports)]
pub use define_rng;

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::Context;
    use crate::random::ContextRandomExt;
    use rand::RngCore;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample::<FooRng, _>(RngCore::next_u64),
            context.sample::<FooRng, _>(RngCore::next_u64)
        );
    }

    #[test]
    fn multiple_rng_types() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample::<FooRng, _>(RngCore::next_u64),
            context.sample::<BarRng, _>(RngCore::next_u64)
        );
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample::<FooRng, _>(RngCore::next_u64);
        let run_1 = context.sample::<FooRng, _>(RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        context.init_random(42);
        assert_eq!(run_0, context.sample::<FooRng, _>(RngCore::next_u64));
        assert_eq!(run_1, context.sample::<FooRng, _>(RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        context.init_random(88);
        assert_ne!(run_0, context.sample::<FooRng, _>(RngCore::next_u64));
        assert_ne!(run_1, context.sample::<FooRng, _>(RngCore::next_u64));
    }

    #[test]
    fn sample_range() {
        let mut context = Context::new();
        context.init_random(42);
        let result = context.sample_range::<FooRng, _, i32>(0..10);
        assert!((0..10).contains(&result));
    }

    #[test]
    fn derived_rngs_ignore_stream_position() {
        let mut context = Context::new();
        context.init_random(7);
        let before = context.derived_rng::<FooRng>(3).next_u64();
        context.sample::<FooRng, _>(RngCore::next_u64);
        assert_eq!(before, context.derived_rng::<FooRng>(3).next_u64());
        assert_ne!(before, context.derived_rng::<FooRng>(4).next_u64());
        assert_ne!(before, context.derived_rng::<BarRng>(3).next_u64());
    }

    #[test]
    fn inverse_cdf_picks_first_weight_above_draw() {
        let cdf = [0.0, 0.25, 0.75, 1.0];
        assert_eq!(draw_from_distribution(&cdf, 0.0), 1);
        assert_eq!(draw_from_distribution(&cdf, 0.3), 2);
        assert_eq!(draw_from_distribution(&cdf, 0.75), 3);
        // Rounded weights that never reach the draw clamp to the last index.
        assert_eq!(draw_from_distribution(&[0.5, 0.9999], 0.99995), 1);
    }

    #[test]
    fn cumulative_draws_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let cdf = [0.1, 0.4, 0.4, 0.9, 1.0];
        let mut counts = [0_usize; 5];
        for _ in 0..100_000 {
            counts[sample_cumulative(&mut rng, &cdf)] += 1;
        }
        // Zero-weight entries are never drawn.
        assert_eq!(counts[2], 0);
        assert!((counts[3] as f64 / 100_000.0 - 0.5).abs() < 0.01);
    }

    #[test]
    fn probabilistic_round_preserves_the_mean() {
        let mut rng = StdRng::seed_from_u64(9);
        let total: usize = (0..10_000).map(|_| probabilistic_round(&mut rng, 2.3)).sum();
        assert!((total as f64 / 10_000.0 - 2.3).abs() < 0.03);
        assert_eq!(probabilistic_round(&mut rng, 0.0), 0);
        assert_eq!(probabilistic_round(&mut rng, 4.0), 4);
    }

    #[test]
    fn exponential_rejects_invalid_rates() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(draw_exponential(&mut rng, -1.0).is_none());
        assert!(draw_exponential(&mut rng, 0.5).is_some_and(|x| x >= 0.0));
    }

    #[test]
    fn shuffled_indices_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut indices = shuffled_indices(&mut rng, 50);
        indices.sort_unstable();
        assert_eq!(indices, (0..50).collect::<Vec<_>>());
    }
}
