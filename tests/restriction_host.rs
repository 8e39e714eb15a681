//! Behavioral suite for the host backend: the six kernel variants,
//! pre-launch validation, and the derived helpers.

use elem_restrict::backend::resolve;
use elem_restrict::prelude::*;

fn host() -> std::sync::Arc<dyn Backend> {
    resolve("host").unwrap()
}

fn line_pair() -> Restriction {
    // Elements [0,1,2] and [1,3,4] sharing node 1.
    let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
    host()
        .create(&layout, MemType::Host, IndexArray::Copied(&[0, 1, 2, 1, 3, 4]))
        .unwrap()
}

#[test]
fn forward_single_component() {
    let r = line_pair();
    let u = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
    let mut v = r.create_evector().unwrap();
    r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    assert_eq!(v.to_vec().unwrap(), vec![10.0, 20.0, 30.0, 20.0, 40.0, 50.0]);
}

#[test]
fn transpose_single_component_accumulates() {
    let r = line_pair();
    let u = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let mut v = r.create_lvector().unwrap();
    r.apply(TransposeMode::Transpose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    // Node 1 sums 2 (elem 0 pos 1) and 4 (elem 1 pos 0).
    assert_eq!(v.to_vec().unwrap(), vec![1.0, 6.0, 3.0, 5.0, 6.0]);
}

#[test]
fn transpose_is_additive_not_overwriting() {
    let r = line_pair();
    let u = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let mut v = Vector::from_slice(&[0.5; 5]);
    r.apply(TransposeMode::Transpose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    assert_eq!(v.to_vec().unwrap(), vec![1.5, 6.5, 3.5, 5.5, 6.5]);
}

#[test]
fn multi_component_interlaced() {
    // 2 components interlaced: indices pre-scaled by 2, comp_stride 1.
    let layout = ElemLayout::indexed(2, 3, 2, 1, 10).unwrap();
    let r = host()
        .create(&layout, MemType::Host, IndexArray::Copied(&[0, 2, 4, 2, 6, 8]))
        .unwrap();
    let u = Vector::from_slice(&(0..10).map(|k| k as Scalar).collect::<Vec<_>>());
    let mut v = r.create_evector().unwrap();
    r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    assert_eq!(
        v.to_vec().unwrap(),
        vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0, 2.0, 6.0, 8.0, 3.0, 7.0, 9.0]
    );
    // Round the same E-vector back: the shared node (slot 2/3) doubles.
    let mut l = r.create_lvector().unwrap();
    r.apply(TransposeMode::Transpose, &v, &mut l, &mut Request::immediate())
        .unwrap();
    assert_eq!(
        l.to_vec().unwrap(),
        vec![0.0, 1.0, 4.0, 6.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
    );
}

#[test]
fn multi_component_planar() {
    // 2 components planar: comp_stride equals the node count.
    let layout = ElemLayout::indexed(2, 3, 2, 5, 10).unwrap();
    let r = host()
        .create(&layout, MemType::Host, IndexArray::Copied(&[0, 1, 2, 1, 3, 4]))
        .unwrap();
    let u = Vector::from_slice(&[
        10.0, 20.0, 30.0, 40.0, 50.0, 100.0, 200.0, 300.0, 400.0, 500.0,
    ]);
    let mut v = r.create_evector().unwrap();
    r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    assert_eq!(
        v.to_vec().unwrap(),
        vec![10.0, 20.0, 30.0, 100.0, 200.0, 300.0, 20.0, 40.0, 50.0, 200.0, 400.0, 500.0]
    );
}

#[test]
fn strided_with_backend_defaults_is_a_copy() {
    let layout = ElemLayout::strided(2, 3, 1, 6, None).unwrap();
    let r = host().create_strided(&layout).unwrap();
    let u = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let mut v = r.create_evector().unwrap();
    r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    assert_eq!(v.to_vec().unwrap(), u.to_vec().unwrap());
    let mut l = r.create_lvector().unwrap();
    r.apply(TransposeMode::Transpose, &v, &mut l, &mut Request::immediate())
        .unwrap();
    assert_eq!(l.to_vec().unwrap(), u.to_vec().unwrap());
}

#[test]
fn strided_with_caller_triple() {
    // L-slot of (e, i) is i*2 + e: elements interleave over the L-vector.
    let layout = ElemLayout::strided(2, 3, 1, 6, Some(EStrides::new(2, 0, 1))).unwrap();
    let r = host().create_strided(&layout).unwrap();
    let u = Vector::from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let mut v = r.create_evector().unwrap();
    r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    assert_eq!(v.to_vec().unwrap(), vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);
    let mut l = r.create_lvector().unwrap();
    r.apply(TransposeMode::Transpose, &v, &mut l, &mut Request::immediate())
        .unwrap();
    assert_eq!(l.to_vec().unwrap(), u.to_vec().unwrap());
}

#[test]
fn strided_ignores_index_constructor() {
    let layout = ElemLayout::strided(2, 3, 1, 6, None).unwrap();
    let err = host()
        .create(&layout, MemType::Host, IndexArray::Copied(&[0; 6]))
        .unwrap_err();
    assert_eq!(err, RestrictError::WrongLayoutKind { expected: "indexed" });
    let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
    let err = host().create_strided(&layout).unwrap_err();
    assert_eq!(err, RestrictError::WrongLayoutKind { expected: "strided" });
}

#[test]
fn multiplicity_counts_element_touches() {
    let r = line_pair();
    let mut mult = r.create_lvector().unwrap();
    r.multiplicity(&mut mult).unwrap();
    assert_eq!(mult.to_vec().unwrap(), vec![1.0, 2.0, 1.0, 1.0, 1.0]);
}

#[test]
fn create_vectors_match_layout() {
    let r = line_pair();
    let (l, e) = r.create_vectors().unwrap();
    assert_eq!(l.len(), 5);
    assert_eq!(e.len(), 6);
    assert_eq!(l.mem_type(), MemType::Host);
}

#[test]
fn empty_restriction_applies_as_no_op() {
    let layout = ElemLayout::indexed(0, 3, 1, 1, 4).unwrap();
    let r = host()
        .create(&layout, MemType::Host, IndexArray::Owned(vec![]))
        .unwrap();
    let u = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0]);
    let mut v = r.create_evector().unwrap();
    assert!(v.is_empty());
    r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap();
    let e = Vector::zeros(0);
    let mut l = Vector::from_slice(&[7.0; 4]);
    r.apply(TransposeMode::Transpose, &e, &mut l, &mut Request::immediate())
        .unwrap();
    assert_eq!(l.to_vec().unwrap(), vec![7.0; 4]);
}

#[test]
fn size_mismatches_name_role_and_side() {
    let r = line_pair();
    let mut v6 = Vector::zeros(6);
    let err = r
        .apply(
            TransposeMode::NoTranspose,
            &Vector::zeros(7),
            &mut v6,
            &mut Request::immediate(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RestrictError::LVectorSizeMismatch {
            role: "input",
            expected: 5,
            found: 7
        }
    );
    let mut v5 = Vector::zeros(5);
    let err = r
        .apply(
            TransposeMode::Transpose,
            &Vector::zeros(2),
            &mut v5,
            &mut Request::immediate(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RestrictError::EVectorSizeMismatch {
            role: "input",
            expected: 6,
            found: 2
        }
    );
}

#[test]
fn construction_validates_indices() {
    let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
    let err = host()
        .create(&layout, MemType::Host, IndexArray::Copied(&[0, 1, 2, 5, 3, 4]))
        .unwrap_err();
    assert_eq!(
        err,
        RestrictError::IndexOutOfRange {
            position: 3,
            index: 5,
            l_size: 5
        }
    );
    let err = host()
        .create(&layout, MemType::Host, IndexArray::Copied(&[0, 1]))
        .unwrap_err();
    assert!(matches!(err, RestrictError::IndexCountMismatch { .. }));
}

#[test]
fn blocked_paths_fail_fast() {
    let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
    let err = host()
        .create_blocked(&layout, 8, MemType::Host, IndexArray::Copied(&[0; 6]))
        .unwrap_err();
    assert_eq!(
        err,
        RestrictError::Unsupported {
            backend: "host",
            op: "blocked restrictions"
        }
    );
    let r = line_pair();
    let u = Vector::zeros(5);
    let mut v = Vector::zeros(6);
    let err = r
        .apply_blocked(8, TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())
        .unwrap_err();
    assert_eq!(
        err,
        RestrictError::Unsupported {
            backend: "host",
            op: "blocked restriction apply"
        }
    );
}

#[test]
fn shared_indices_are_not_copied() {
    let shared: std::sync::Arc<[u32]> = vec![0u32, 1, 2, 1, 3, 4].into();
    let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
    let r = host()
        .create(&layout, MemType::Host, IndexArray::Shared(shared.clone()))
        .unwrap();
    // Handle holds the second reference.
    assert_eq!(std::sync::Arc::strong_count(&shared), 2);
    drop(r);
    assert_eq!(std::sync::Arc::strong_count(&shared), 1);
}

#[test]
fn request_modes_all_complete_on_host() {
    let r = line_pair();
    let u = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
    for mut rq in [Request::immediate(), Request::ordered(), Request::deferred()] {
        let mut v = r.create_evector().unwrap();
        r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut rq).unwrap();
        assert!(!rq.is_pending());
        rq.wait().unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![10.0, 20.0, 30.0, 20.0, 40.0, 50.0]);
    }
}

#[test]
fn layout_accessors_round_trip_through_handle() {
    let r = line_pair();
    assert_eq!(r.backend_name(), "host");
    assert_eq!(r.num_elements(), 2);
    assert_eq!(r.elem_size(), 3);
    assert_eq!(r.num_components(), 1);
    assert_eq!(r.lvector_size(), 5);
    assert_eq!(r.evector_size(), 6);
    assert_eq!(r.e_strides(), EStrides::new(1, 3, 3));
}
