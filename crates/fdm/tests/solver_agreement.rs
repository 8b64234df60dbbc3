//! Cross-solver agreement tests.
//!
//! Every solver family must converge to the same solution of the same
//! well-posed Poisson system.

use freshet_core::{Size2, Size3};
use freshet_fdm::{
    Blas, FdmBlas2, FdmBlas3, FdmGaussSeidelSolver3, FdmIccgSolver3, FdmLinearSystem3,
    FdmLinearSystemSolver3, FdmMatrixRow2, FdmMatrixRow3, FdmMgLinearSystem2, FdmMgSolver2,
};

fn poisson_system_3d(size: Size3) -> FdmLinearSystem3 {
    let mut system = FdmLinearSystem3::new();
    system.resize(size);
    for k in 0..size.z {
        for j in 0..size.y {
            for i in 0..size.x {
                let mut row = FdmMatrixRow3 {
                    center: 6.0,
                    ..Default::default()
                };
                if i + 1 < size.x {
                    row.right = -1.0;
                }
                if j + 1 < size.y {
                    row.up = -1.0;
                }
                if k + 1 < size.z {
                    row.front = -1.0;
                }
                system.a[(i, j, k)] = row;
                system.b[(i, j, k)] = ((i + j + k) % 3) as f32;
            }
        }
    }
    system
}

#[test]
fn gauss_seidel_and_iccg_agree() {
    let size = Size3::new(8, 8, 8);
    let mut gs_system = poisson_system_3d(size);
    let mut iccg_system = poisson_system_3d(size);

    let mut gs = FdmGaussSeidelSolver3::new(2000, 10, 1e-4);
    let mut iccg = FdmIccgSolver3::new(200, 1e-5);
    assert!(gs.solve(&mut gs_system));
    assert!(iccg.solve(&mut iccg_system));

    for (a, b) in gs_system.x.as_slice().iter().zip(iccg_system.x.as_slice()) {
        assert!((a - b).abs() < 1e-2, "{} vs {}", a, b);
    }
}

#[test]
fn repeated_v_cycles_converge() {
    // Driving the V-cycle until the residual is tiny must approach the
    // exact solution of the finest system.
    let mut system = FdmMgLinearSystem2::new();
    system.resize_with_coarsest(Size2::new(4, 4), 3);

    for level in 0..system.number_of_levels() {
        let n = system.a.levels[level].size();
        for j in 0..n.y {
            for i in 0..n.x {
                let mut row = FdmMatrixRow2 {
                    center: 4.0,
                    ..Default::default()
                };
                if i + 1 < n.x {
                    row.right = -1.0;
                }
                if j + 1 < n.y {
                    row.up = -1.0;
                }
                system.a.levels[level][(i, j)] = row;
            }
        }
    }
    system.b.levels[0].fill(1.0);

    let mut solver = FdmMgSolver2::new(3);
    for _ in 0..8 {
        let _ = solver.solve(&mut system);
    }

    let mut r = system.x.levels[0].clone();
    FdmBlas2::residual(
        &system.a.levels[0],
        &system.x.levels[0],
        &system.b.levels[0],
        &mut r,
    );
    assert!(
        FdmBlas2::l2_norm(&r) < 1e-3,
        "residual after 8 V-cycles: {}",
        FdmBlas2::l2_norm(&r)
    );
}

#[test]
fn mvm_is_symmetric() {
    // The stencil stores only positive-direction off-diagonals; mvm must
    // still behave as the full symmetric operator: x.(Ay) == y.(Ax).
    let size = Size3::new(5, 4, 3);
    let system = poisson_system_3d(size);

    let mut x = system.x.clone();
    let mut y = system.x.clone();
    for (n, v) in x.as_mut_slice().iter_mut().enumerate() {
        *v = (n % 7) as f32 - 3.0;
    }
    for (n, v) in y.as_mut_slice().iter_mut().enumerate() {
        *v = (n % 5) as f32 - 2.0;
    }

    let mut ax = system.x.clone();
    let mut ay = system.x.clone();
    FdmBlas3::mvm(&system.a, &x, &mut ax);
    FdmBlas3::mvm(&system.a, &y, &mut ay);

    let left = FdmBlas3::dot(&x, &ay);
    let right = FdmBlas3::dot(&y, &ax);
    assert!((left - right).abs() < 1e-3 * left.abs().max(1.0), "{} vs {}", left, right);
}
