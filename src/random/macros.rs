/// Defines a named random stream. Each stream gets its own generator per replicate, seeded from
/// the base seed, the stream name, and the replicate index, so draws made on one stream never
/// shift the sequence seen by another.
#[macro_export]
macro_rules! define_rng {
    ($random_id:ident) => {
        #[derive(Copy, Clone, Debug)]
        pub struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $crate::rand::rngs::SmallRng;

            fn get_name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}
pub use define_rng;
