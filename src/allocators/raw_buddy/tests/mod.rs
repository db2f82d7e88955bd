use core::ptr::null_mut;
use core::slice;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::*;
use crate::header::{Header, PAYLOAD_ALIGN};
use crate::order::{
    class_bytes, class_payload, order_for, order_of_payload, MAX_ORDER, ROOT_COUNT,
};
use crate::source::{BufferSource, MmapSource};


const BOOTSTRAP: Stats = Stats::bootstrap(ROOT_COUNT, MAX_CLASS_PAYLOAD);

fn allocator() -> RawBuddy<MmapSource> {
    format::init();
    RawBuddy::with_source(MmapSource::new())
}

fn payload_size(p: NonNull<u8>) -> usize {
    unsafe { p.as_ptr().sub(HEADER_SIZE).cast::<Header>().read().payload_size }
}

/// Blocks that are handed out right now, pooled or mapped.
fn occupied<S: ArenaSource>(a: &RawBuddy<S>) -> usize {
    a.allocated_blocks() - a.free_blocks()
}

/// Largest request served from an order 0 block.
const SMALL: usize = class_payload(0);

/// Checks the ledger against a walk of the arena, given the mapped objects still alive.
fn assert_consistent<S: ArenaSource>(
    a: &RawBuddy<S>,
    mapped_blocks: usize,
    mapped_bytes: usize,
) {
    let audit = a.audit().expect("Arena should be reserved.");
    let stats = a.stats();
    assert_eq!(audit.stats.free_blocks, stats.free_blocks);
    assert_eq!(audit.stats.free_bytes, stats.free_bytes);
    assert_eq!(audit.stats.allocated_blocks + mapped_blocks, stats.allocated_blocks);
    assert_eq!(audit.stats.allocated_bytes + mapped_bytes, stats.allocated_bytes);
}

unsafe fn fill(p: NonNull<u8>, len: usize, tag: u8) {
    for (i, byte) in slice::from_raw_parts_mut(p.as_ptr(), len).iter_mut().enumerate() {
        *byte = tag.wrapping_add(i as u8);
    }
}

unsafe fn holds(p: NonNull<u8>, len: usize, tag: u8) -> bool {
    slice::from_raw_parts(p.as_ptr(), len)
        .iter()
        .enumerate()
        .all(|(i, &byte)| byte == tag.wrapping_add(i as u8))
}

fn disjoint(p: NonNull<u8>, q: NonNull<u8>) -> bool {
    let (p_start, q_start) = (p.as_ptr() as usize, q.as_ptr() as usize);
    p_start + payload_size(p) <= q_start - HEADER_SIZE
        || q_start + payload_size(q) <= p_start - HEADER_SIZE
}

#[test]
fn test_bootstrap_is_lazy() {
    let mut a = allocator();
    assert_eq!(a.stats(), Stats::new());
    assert!(a.audit().is_none());

    unsafe { a.release(null_mut()) };
    assert_eq!(a.stats(), Stats::new());

    // The first request reserves the arena even though it fails.
    assert_eq!(a.allocate(0), Err(AllocError::ZeroSize));
    assert_eq!(a.stats(), BOOTSTRAP);
    assert_eq!(a.audit().unwrap().free_per_order[MAX_ORDER], ROOT_COUNT);
    assert_eq!(a.metadata_bytes(), ROOT_COUNT * HEADER_SIZE);
    assert_eq!(a.header_size(), HEADER_SIZE);
}

#[test]
fn test_zero_allocate_bootstraps_before_size_check() {
    let mut a = allocator();
    assert_eq!(a.zero_allocate(0, 8), Err(AllocError::ZeroSize));
    assert_eq!(a.stats(), BOOTSTRAP);
    assert_consistent(&a, 0, 0);

    let mut b = allocator();
    assert_eq!(unsafe { b.resize(null_mut(), 0) }, Err(AllocError::ZeroSize));
    assert_eq!(b.stats(), BOOTSTRAP);
}

#[test]
fn test_size_bounds() {
    let mut a = allocator();
    assert_eq!(a.allocate(0), Err(AllocError::ZeroSize));
    assert_eq!(
        a.allocate(MAX_ALLOCATION + 1),
        Err(AllocError::TooLarge(MAX_ALLOCATION + 1))
    );
    assert_eq!(a.zero_allocate(0, 8), Err(AllocError::ZeroSize));
    assert_eq!(a.zero_allocate(8, 0), Err(AllocError::ZeroSize));
    assert_eq!(a.zero_allocate(usize::MAX, 2), Err(AllocError::Overflow));
    assert_eq!(
        a.zero_allocate(MAX_ALLOCATION, 2),
        Err(AllocError::TooLarge(2 * MAX_ALLOCATION))
    );
    unsafe {
        assert_eq!(a.resize(null_mut(), 0), Err(AllocError::ZeroSize));
        assert_eq!(
            a.resize(null_mut(), MAX_ALLOCATION + 1),
            Err(AllocError::TooLarge(MAX_ALLOCATION + 1))
        );
    }
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[test]
fn test_allocation_capacity() {
    let mut a = allocator();
    let sizes = [1, 50, 96, 97, 100, 200, 1000, 4000, 65_000, MAX_CLASS_PAYLOAD];

    let mut objects = vec![];
    for (tag, &size) in sizes.iter().enumerate() {
        let p = a.allocate(size).unwrap();
        let payload = payload_size(p);
        assert!(payload >= size);
        assert_eq!(order_of_payload(payload), order_for(size + HEADER_SIZE));
        assert_eq!(p.as_ptr() as usize % PAYLOAD_ALIGN, 0);
        unsafe { fill(p, payload, tag as u8) };
        objects.push((p, payload, tag as u8));
    }

    for (i, &(p, payload, tag)) in objects.iter().enumerate() {
        assert!(unsafe { holds(p, payload, tag) }, "Object {i} was overwritten.");
        for &(q, _, _) in &objects[i + 1..] {
            assert!(disjoint(p, q));
        }
    }
    assert_consistent(&a, 0, 0);

    for (p, _, _) in objects {
        unsafe { a.release(p.as_ptr()) };
    }
    assert_eq!(a.stats(), BOOTSTRAP);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_first_allocation_splits_a_root() {
    let mut a = allocator();
    let p = a.allocate(SMALL).unwrap();
    assert_eq!(payload_size(p), class_payload(0));

    // One root halved all the way down leaves one free buddy per order below the top.
    assert_eq!(a.allocated_blocks(), ROOT_COUNT + MAX_ORDER);
    assert_eq!(a.free_blocks(), ROOT_COUNT + MAX_ORDER - 1);
    assert_eq!(
        a.allocated_bytes(),
        BOOTSTRAP.allocated_bytes - MAX_ORDER * HEADER_SIZE
    );
    assert_eq!(
        a.free_bytes(),
        BOOTSTRAP.free_bytes - MAX_ORDER * HEADER_SIZE - class_payload(0)
    );
    assert_eq!(a.metadata_bytes(), (ROOT_COUNT + MAX_ORDER) * HEADER_SIZE);

    let audit = a.audit().unwrap();
    assert_eq!(audit.free_per_order[MAX_ORDER], ROOT_COUNT - 1);
    for order in 0..MAX_ORDER {
        assert_eq!(audit.free_per_order[order], 1);
    }
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_splitting_stops_at_order_zero() {
    let mut a = allocator();
    let p = a.allocate(1).unwrap();
    let q = a.allocate(1).unwrap();
    assert_eq!(payload_size(p), class_payload(0));
    assert_eq!(payload_size(q), class_payload(0));
    assert_eq!(q.as_ptr() as usize - p.as_ptr() as usize, class_bytes(0));
    assert_eq!(a.audit().unwrap().free_per_order[0], 0);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_small_pair_scenario() {
    let mut a = allocator();
    let p = a.allocate(100).unwrap();
    let q = a.allocate(200).unwrap();
    // Neither fits an order 0 block once the header is counted.
    assert_eq!(order_of_payload(payload_size(p)), Some(1));
    assert_eq!(order_of_payload(payload_size(q)), Some(1));
    assert!(disjoint(p, q));
    // `q` is the order 1 buddy left free by splitting for `p`.
    assert_eq!(q.as_ptr() as usize - p.as_ptr() as usize, class_bytes(1));

    // The root was halved down to order 1 and `q` needed no further split.
    let peak = a.allocated_blocks();
    assert_eq!(peak, ROOT_COUNT + MAX_ORDER - 1);
    assert_eq!(a.free_blocks(), ROOT_COUNT + MAX_ORDER - 3);
    assert_eq!(occupied(&a), 2);
    assert_consistent(&a, 0, 0);

    unsafe { a.release(p.as_ptr()) };
    // `p` can't merge while its buddy `q` is in use.
    assert_eq!(a.allocated_blocks(), peak);
    assert_eq!(occupied(&a), 1);
    assert_eq!(a.audit().unwrap().free_per_order[1], 1);
    assert_consistent(&a, 0, 0);

    unsafe { a.release(q.as_ptr()) };
    assert_eq!(occupied(&a), 0);
    assert_eq!(a.stats(), BOOTSTRAP);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_release_credits_payload_before_coalescing() {
    let mut a = allocator();
    let p = a.allocate(50).unwrap();
    let q = a.allocate(50).unwrap();
    let before = a.stats();

    unsafe { a.release(p.as_ptr()) };
    let after = a.stats();
    assert_eq!(after.free_bytes, before.free_bytes + class_payload(0));
    assert_eq!(after.free_blocks, before.free_blocks + 1);
    assert_eq!(after.allocated_blocks, before.allocated_blocks);
    assert_eq!(after.allocated_bytes, before.allocated_bytes);

    unsafe { a.release(q.as_ptr()) };
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[test]
fn test_releasing_a_whole_root_restores_it() {
    let mut a = allocator();
    let per_root = class_bytes(MAX_ORDER) / class_bytes(0);

    let mut objects: Vec<_> = (0..per_root).map(|_| a.allocate(1).unwrap()).collect();
    let audit = a.audit().unwrap();
    assert_eq!(audit.free_per_order[MAX_ORDER], ROOT_COUNT - 1);
    assert_eq!(audit.free_per_order[..MAX_ORDER].iter().sum::<usize>(), 0);

    objects.shuffle(&mut StdRng::seed_from_u64(7));
    for p in objects {
        unsafe { a.release(p.as_ptr()) };
        assert_consistent(&a, 0, 0);
    }

    assert_eq!(a.stats(), BOOTSTRAP);
    let audit = a.audit().unwrap();
    assert_eq!(audit.free_per_order[MAX_ORDER], ROOT_COUNT);
    assert_eq!(audit.free_per_order[..MAX_ORDER].iter().sum::<usize>(), 0);
}

#[test]
fn test_release_null() {
    let mut a = allocator();
    let _p = a.allocate(10).unwrap();
    let before = a.stats();
    unsafe { a.release(null_mut()) };
    assert_eq!(a.stats(), before);
}

#[cfg(not(feature = "strict-release"))]
#[test]
fn test_double_release_is_ignored() {
    let mut a = allocator();
    let p = a.allocate(100).unwrap();
    let q = a.allocate(100).unwrap();
    unsafe {
        a.release(p.as_ptr());
        let before = a.stats();
        a.release(p.as_ptr());
        assert_eq!(a.stats(), before);
        a.release(q.as_ptr());
    }
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[cfg(feature = "strict-release")]
#[test]
#[should_panic]
fn test_double_release_panics() {
    let mut a = allocator();
    let p = a.allocate(100).unwrap();
    let _q = a.allocate(100).unwrap();
    unsafe {
        a.release(p.as_ptr());
        a.release(p.as_ptr());
    }
}

#[test]
fn test_resize_never_shrinks() {
    let mut a = allocator();
    let p = a.allocate(1000).unwrap();
    let payload = payload_size(p);
    unsafe {
        fill(p, payload, 3);
        assert_eq!(a.resize(p.as_ptr(), 10), Ok(p));
        assert_eq!(a.resize(p.as_ptr(), payload), Ok(p));
        assert!(holds(p, payload, 3));
    }
    assert_eq!(payload_size(p), payload);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_resize_grows_into_upper_buddy() {
    let mut a = allocator();
    let p = a.allocate(SMALL).unwrap();
    assert_eq!(payload_size(p), class_payload(0));
    let before = a.stats();
    unsafe {
        fill(p, SMALL, 11);
        let r = a.resize(p.as_ptr(), SMALL + 1).unwrap();
        assert_eq!(r, p);
        assert_eq!(payload_size(r), class_payload(1));
        assert!(holds(r, SMALL, 11));
    }
    // The block merged with its order 0 buddy instead of taking a fresh one.
    assert_eq!(a.allocated_blocks(), before.allocated_blocks - 1);
    assert_eq!(a.audit().unwrap().free_per_order[0], 0);
    assert_eq!(occupied(&a), 1);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_resize_grows_through_several_orders() {
    let mut a = allocator();
    let p = a.allocate(SMALL).unwrap();
    unsafe {
        fill(p, SMALL, 23);
        let r = a.resize(p.as_ptr(), 5000).unwrap();
        assert_eq!(r, p);
        assert_eq!(payload_size(r), class_payload(6));
        assert!(holds(r, SMALL, 23));
    }
    assert_consistent(&a, 0, 0);
    unsafe { a.release(p.as_ptr()) };
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[test]
fn test_resize_grows_into_lower_buddy() {
    let mut a = allocator();
    let p = a.allocate(SMALL).unwrap();
    let q = a.allocate(SMALL).unwrap();
    assert_eq!(q.as_ptr() as usize - p.as_ptr() as usize, class_bytes(0));
    unsafe {
        a.release(p.as_ptr());
        fill(q, SMALL, 42);
        let r = a.resize(q.as_ptr(), SMALL + 1).unwrap();
        // The merged block starts where the lower buddy did.
        assert_eq!(r, p);
        assert_eq!(payload_size(r), class_payload(1));
        assert!(holds(r, SMALL, 42));
    }
    assert_eq!(occupied(&a), 1);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_resize_relocates_when_buddy_is_busy() {
    let mut a = allocator();
    let p = a.allocate(SMALL).unwrap();
    let q = a.allocate(SMALL).unwrap();
    unsafe {
        fill(p, SMALL, 1);
        fill(q, SMALL, 2);
        let r = a.resize(p.as_ptr(), SMALL + 1).unwrap();
        assert_ne!(r, p);
        // The order 1 buddy left over from the first split.
        assert_eq!(r.as_ptr() as usize - p.as_ptr() as usize, class_bytes(1));
        assert_eq!(payload_size(r), class_payload(1));
        assert!(holds(r, SMALL, 1));
        assert!(holds(q, SMALL, 2));
        assert!(disjoint(r, q));
    }
    assert_eq!(occupied(&a), 2);
    assert_consistent(&a, 0, 0);
}

#[cfg(not(feature = "strict-release"))]
#[test]
fn test_resize_of_free_block_changes_nothing() {
    let mut a = allocator();
    let p = a.allocate(SMALL).unwrap();
    let _q = a.allocate(SMALL).unwrap();
    unsafe {
        a.release(p.as_ptr());
        let before = a.stats();
        assert_eq!(a.resize(p.as_ptr(), 5000), Err(AllocError::AlreadyFree));
        assert_eq!(a.resize(p.as_ptr(), 10), Err(AllocError::AlreadyFree));
        assert_eq!(a.stats(), before);
    }
    assert_eq!(occupied(&a), 1);
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_resize_null_allocates() {
    let mut a = allocator();
    let p = unsafe { a.resize(null_mut(), 64) }.unwrap();
    assert!(payload_size(p) >= 64);
    assert_eq!(occupied(&a), 1);
}

#[test]
fn test_failed_resize_keeps_original() {
    let mut a = allocator();
    let _roots: Vec<_> = (0..ROOT_COUNT - 1)
        .map(|_| a.allocate(MAX_CLASS_PAYLOAD).unwrap())
        .collect();
    let p = a.allocate(class_payload(MAX_ORDER - 1)).unwrap();
    let q = a.allocate(class_payload(MAX_ORDER - 1)).unwrap();
    assert_eq!(a.free_blocks(), 0);

    unsafe {
        fill(p, 1000, 9);
        let before = a.stats();
        assert_eq!(
            a.resize(p.as_ptr(), MAX_CLASS_PAYLOAD),
            Err(AllocError::OutOfBlocks(MAX_ORDER))
        );
        assert_eq!(a.stats(), before);
        assert!(holds(p, 1000, 9));

        a.release(q.as_ptr());
        // Now the buddy is free and the block can grow in place.
        assert_eq!(a.resize(p.as_ptr(), MAX_CLASS_PAYLOAD), Ok(p));
        assert!(holds(p, 1000, 9));
    }
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_boundary_between_pool_and_mapping() {
    let mut a = allocator();
    let p = a.allocate(MAX_CLASS_PAYLOAD).unwrap();
    assert_eq!(a.allocated_blocks(), ROOT_COUNT);
    assert_eq!(a.free_blocks(), ROOT_COUNT - 1);

    let q = a.allocate(MAX_CLASS_PAYLOAD + 1).unwrap();
    assert_eq!(payload_size(q), MAX_CLASS_PAYLOAD + 1);
    assert_eq!(q.as_ptr() as usize % PAYLOAD_ALIGN, 0);
    assert_eq!(a.allocated_blocks(), ROOT_COUNT + 1);
    assert_eq!(a.free_blocks(), ROOT_COUNT - 1);
    assert_eq!(
        a.allocated_bytes(),
        BOOTSTRAP.allocated_bytes + MAX_CLASS_PAYLOAD + 1
    );
    assert_consistent(&a, 1, MAX_CLASS_PAYLOAD + 1);

    unsafe {
        a.release(q.as_ptr());
        a.release(p.as_ptr());
    }
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[test]
fn test_resize_mapped() {
    let mut a = allocator();
    let size = MAX_CLASS_PAYLOAD + 1;
    let p = a.allocate(size).unwrap();
    unsafe {
        fill(p, size, 5);
        assert_eq!(a.resize(p.as_ptr(), size), Ok(p));

        let q = a.resize(p.as_ptr(), 2 * size).unwrap();
        assert_eq!(payload_size(q), 2 * size);
        assert!(holds(q, size, 5));
        assert_consistent(&a, 1, 2 * size);

        let r = a.resize(q.as_ptr(), 1000).unwrap();
        assert_eq!(payload_size(r), class_payload(4));
        assert!(holds(r, 1000, 5));
        assert_consistent(&a, 0, 0);

        a.release(r.as_ptr());
    }
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[test]
fn test_resize_pool_to_mapping() {
    let mut a = allocator();
    let p = a.allocate(1000).unwrap();
    unsafe {
        fill(p, 1000, 77);
        let q = a.resize(p.as_ptr(), MAX_CLASS_PAYLOAD + 1).unwrap();
        assert_eq!(payload_size(q), MAX_CLASS_PAYLOAD + 1);
        assert!(holds(q, 1000, 77));
        assert_consistent(&a, 1, MAX_CLASS_PAYLOAD + 1);
        a.release(q.as_ptr());
    }
    assert_eq!(a.stats(), BOOTSTRAP);
}

#[test]
fn test_zero_allocate_clears_reused_block() {
    let mut a = allocator();
    let p = a.allocate(300).unwrap();
    unsafe {
        p.as_ptr().write_bytes(0xAB, payload_size(p));
        a.release(p.as_ptr());
    }

    let z = a.zero_allocate(10, 30).unwrap();
    assert_eq!(z, p);
    assert!(unsafe { slice::from_raw_parts(z.as_ptr(), 300) }
        .iter()
        .all(|&b| b == 0));

    let large = a.zero_allocate(2, MAX_CLASS_PAYLOAD).unwrap();
    assert!(unsafe { slice::from_raw_parts(large.as_ptr(), 2 * MAX_CLASS_PAYLOAD) }
        .iter()
        .all(|&b| b == 0));
    assert_consistent(&a, 1, 2 * MAX_CLASS_PAYLOAD);
}

#[test]
fn test_exhaustion() {
    let mut a = allocator();
    let roots: Vec<_> = (0..ROOT_COUNT)
        .map(|_| a.allocate(MAX_CLASS_PAYLOAD).unwrap())
        .collect();
    assert_eq!(
        a.allocate(MAX_CLASS_PAYLOAD),
        Err(AllocError::OutOfBlocks(MAX_ORDER))
    );
    assert_eq!(a.allocate(1), Err(AllocError::OutOfBlocks(0)));

    // Large objects don't need the arena.
    let large = a.allocate(MAX_CLASS_PAYLOAD + 1).unwrap();
    unsafe {
        a.release(large.as_ptr());
        a.release(roots[5].as_ptr());
    }
    assert!(a.allocate(1).is_ok());
    assert_consistent(&a, 0, 0);
}

#[test]
fn test_failed_bootstrap_disables_allocator() {
    let mut buf = vec![0_u8; 1024];
    let mut a = RawBuddy::with_source(BufferSource::new(&mut buf));
    assert_eq!(a.allocate(100), Err(AllocError::ArenaUnavailable));
    assert_eq!(a.allocate(100), Err(AllocError::ArenaUnavailable));
    assert_eq!(
        a.allocate(MAX_CLASS_PAYLOAD + 1),
        Err(AllocError::ArenaUnavailable)
    );
    assert_eq!(a.zero_allocate(4, 4), Err(AllocError::ArenaUnavailable));
    unsafe {
        assert_eq!(a.resize(null_mut(), 10), Err(AllocError::ArenaUnavailable));
        a.release(null_mut());
    }
    assert_eq!(a.stats(), Stats::new());
}

#[test]
fn test_buffer_backed_allocator() {
    let mut buf = vec![0_u8; ARENA_BYTES + MIN_CLASS_BYTES];
    let range = buf.as_ptr_range();
    {
        let mut a = RawBuddy::with_source(BufferSource::new(&mut buf));
        let p = a.allocate(100).unwrap();
        assert!(range.contains(&(p.as_ptr() as *const u8)));
        unsafe { a.release(p.as_ptr()) };
        assert_eq!(a.stats(), BOOTSTRAP);
    }
}

#[test]
fn test_random_operations_keep_ledger_consistent() {
    let mut a = allocator();
    let mut rng = StdRng::seed_from_u64(0xB0DD1E);
    let mut live: Vec<(NonNull<u8>, usize, u8)> = vec![];
    // Reserve the arena up front so the ledger can be audited from the first step.
    assert_eq!(a.allocate(0), Err(AllocError::ZeroSize));

    let random_size = |rng: &mut StdRng| match rng.gen_range(0..20) {
        0 => rng.gen_range(MAX_CLASS_PAYLOAD - 1000..=3 * MAX_CLASS_PAYLOAD),
        1..=3 => rng.gen_range(1..=MAX_CLASS_PAYLOAD / 2),
        _ => rng.gen_range(1..=2048),
    };

    for step in 0..2000 {
        match rng.gen_range(0..3) {
            0 => {
                let size = random_size(&mut rng);
                if let Ok(p) = a.allocate(size) {
                    let tag = step as u8;
                    unsafe { fill(p, size, tag) };
                    live.push((p, size, tag));
                }
            }
            1 if !live.is_empty() => {
                let (p, size, tag) = live.swap_remove(rng.gen_range(0..live.len()));
                assert!(unsafe { holds(p, size, tag) }, "Step {step}: object was overwritten.");
                unsafe { a.release(p.as_ptr()) };
            }
            2 if !live.is_empty() => {
                let i = rng.gen_range(0..live.len());
                let (p, size, tag) = live[i];
                let new_size = random_size(&mut rng);
                if let Ok(q) = unsafe { a.resize(p.as_ptr(), new_size) } {
                    let kept = unsafe { holds(q, size.min(new_size), tag) };
                    assert!(kept, "Step {step}: resize lost data.");
                    unsafe { fill(q, new_size, tag) };
                    live[i] = (q, new_size, tag);
                } else {
                    let kept = unsafe { holds(p, size, tag) };
                    assert!(kept, "Step {step}: failed resize lost data.");
                }
            }
            _ => {}
        }

        let (mapped_blocks, mapped_bytes) = live
            .iter()
            .map(|&(p, _, _)| payload_size(p))
            .filter(|&payload| payload > MAX_CLASS_PAYLOAD)
            .fold((0, 0), |(blocks, bytes), payload| (blocks + 1, bytes + payload));
        assert_consistent(&a, mapped_blocks, mapped_bytes);
        assert_eq!(occupied(&a), live.len());
    }

    for (p, size, tag) in live {
        assert!(unsafe { holds(p, size, tag) });
        unsafe { a.release(p.as_ptr()) };
    }
    assert_eq!(a.stats(), BOOTSTRAP);
}
