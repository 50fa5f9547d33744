//! Ping-pong pair of off-screen surfaces.
//!
//! Chained passes alternate between the two surfaces: one is written while
//! the other is read, then the roles swap. The pool never hands out the
//! same surface for both roles.

/// Role assignment over two backend surfaces.
///
/// `S` is the backend's surface handle; the pool only moves handles around
/// and never touches surface contents.
#[derive(Clone, Debug)]
pub struct RenderTargetPool<S> {
    surfaces: [S; 2],
    write: usize,
}

impl<S: Copy + PartialEq> RenderTargetPool<S> {
    /// `primary` is the surface the scene pass renders into. The pool starts
    /// seeded: writing `secondary`, reading `primary`.
    pub fn new(primary: S, secondary: S) -> Self {
        debug_assert!(primary != secondary, "ping-pong surfaces must differ");
        Self {
            surfaces: [primary, secondary],
            write: 1,
        }
    }

    pub fn primary(&self) -> S {
        self.surfaces[0]
    }

    pub fn secondary(&self) -> S {
        self.surfaces[1]
    }

    pub fn write_target(&self) -> S {
        self.surfaces[self.write]
    }

    pub fn read_source(&self) -> S {
        self.surfaces[1 - self.write]
    }

    /// Exchange the write and read roles. No data moves.
    pub fn swap(&mut self) {
        self.write = 1 - self.write;
    }

    /// Point the pool back at the scene output: write secondary, read primary.
    pub fn seed(&mut self) {
        self.write = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_roles() {
        let pool = RenderTargetPool::new(10u32, 20u32);
        assert_eq!(pool.primary(), 10);
        assert_eq!(pool.secondary(), 20);
        assert_eq!(pool.write_target(), 20);
        assert_eq!(pool.read_source(), 10);
    }

    #[test]
    fn test_swap_parity() {
        let mut pool = RenderTargetPool::new('a', 'b');
        let (write, read) = (pool.write_target(), pool.read_source());

        for n in 1..=9 {
            pool.swap();
            assert_ne!(pool.write_target(), pool.read_source());
            if n % 2 == 0 {
                assert_eq!((pool.write_target(), pool.read_source()), (write, read));
            } else {
                assert_eq!((pool.write_target(), pool.read_source()), (read, write));
            }
        }
    }

    #[test]
    fn test_seed_restores_scene_roles() {
        let mut pool = RenderTargetPool::new(0u8, 1u8);
        pool.swap();
        assert_eq!(pool.write_target(), 0);

        pool.seed();
        assert_eq!(pool.write_target(), 1);
        assert_eq!(pool.read_source(), 0);

        // Seeding twice is the same as seeding once.
        pool.seed();
        assert_eq!(pool.write_target(), 1);
    }
}
