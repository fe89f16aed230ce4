use isam_core::{
    nalgebra::{DVector, Point2, Point3, Rotation3, Vector2, Vector3},
    CameraIntrinsics, CameraPose, Error, Factor, FactorGraph, NoiseModel, Symbol, Values,
};
use isam_optimize::{batch_refine, Isam, IsamParams};

const POSE_COUNT: usize = 8;
const CIRCLE_RADIUS: f64 = 30.0;
const CUBE_HALF_EXTENT: f64 = 10.0;

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::identity()
        .focals(Vector2::new(50.0, 50.0))
        .principal_point(Point2::new(50.0, 50.0))
}

fn pose_prior_noise() -> NoiseModel {
    NoiseModel::diagonal(DVector::from_vec(vec![0.3, 0.3, 0.3, 0.1, 0.1, 0.1]))
}

fn circle_poses() -> Vec<CameraPose> {
    (0..POSE_COUNT)
        .map(|ix| {
            let angle = 2.0 * std::f64::consts::PI * ix as f64 / POSE_COUNT as f64;
            let eye = Point3::new(CIRCLE_RADIUS * angle.cos(), CIRCLE_RADIUS * angle.sin(), 0.0);
            CameraPose::facing(eye, Point3::origin(), Vector3::z())
        })
        .collect()
}

fn cube_landmarks() -> Vec<Point3<f64>> {
    let h = CUBE_HALF_EXTENT;
    vec![
        Point3::new(h, h, h),
        Point3::new(-h, h, h),
        Point3::new(-h, -h, h),
        Point3::new(h, -h, h),
        Point3::new(h, h, -h),
        Point3::new(-h, h, -h),
        Point3::new(-h, -h, -h),
        Point3::new(h, -h, -h),
    ]
}

/// The guesses are intentionally off from the ground truth.
fn pose_guess(truth: &CameraPose) -> CameraPose {
    let offset = CameraPose::from_parts(
        Vector3::new(0.05, -0.10, 0.20),
        Rotation3::new(Vector3::new(-0.1, 0.2, 0.25)),
    );
    truth.compose(&offset)
}

fn point_guess(truth: &Point3<f64>) -> Point3<f64> {
    truth + Vector3::new(-0.25, 0.20, 0.15)
}

fn pixel(pose: &CameraPose, point: &Point3<f64>) -> Point2<f64> {
    intrinsics()
        .project(pose.world_to_camera(*point))
        .expect("synthetic landmarks are always in front of the cameras")
}

fn push_frame(
    graph: &mut FactorGraph,
    guesses: &mut Values,
    frame: usize,
    poses: &[CameraPose],
    landmarks: &[Point3<f64>],
) {
    for (ix, landmark) in landmarks.iter().enumerate() {
        graph.push(Factor::Projection {
            pose: Symbol::Pose(frame),
            landmark: Symbol::Landmark(ix),
            pixel: pixel(&poses[frame], landmark),
            intrinsics: intrinsics(),
            noise: NoiseModel::isotropic(1.0),
        });
    }
    guesses
        .insert_pose(Symbol::Pose(frame), pose_guess(&poses[frame]))
        .unwrap();
}

fn push_priors_and_landmark_guesses(
    graph: &mut FactorGraph,
    guesses: &mut Values,
    poses: &[CameraPose],
    landmarks: &[Point3<f64>],
) {
    graph.push(Factor::PosePrior {
        symbol: Symbol::Pose(0),
        pose: poses[0],
        noise: pose_prior_noise(),
    });
    graph.push(Factor::PointPrior {
        symbol: Symbol::Landmark(0),
        point: landmarks[0],
        noise: NoiseModel::isotropic(0.1),
    });
    for (ix, landmark) in landmarks.iter().enumerate() {
        guesses
            .insert_point(Symbol::Landmark(ix), point_guess(landmark))
            .unwrap();
    }
}

/// Runs the canonical incremental schedule: the first frame only primes
/// the pending batch, every later frame commits it and refines once.
fn run_sequence() -> Isam {
    let poses = circle_poses();
    let landmarks = cube_landmarks();
    let mut isam = Isam::new(IsamParams {
        relinearize_threshold: 0.01,
        relinearize_skip: 1,
    });
    let mut graph = FactorGraph::new();
    let mut guesses = Values::new();
    for frame in 0..poses.len() {
        push_frame(&mut graph, &mut guesses, frame, &poses, &landmarks);
        if frame == 0 {
            push_priors_and_landmark_guesses(&mut graph, &mut guesses, &poses, &landmarks);
        } else {
            isam.update(
                std::mem::take(&mut graph),
                std::mem::take(&mut guesses),
            )
            .unwrap();
            isam.refine().unwrap();
        }
    }
    isam
}

#[test]
fn scenario_converges_within_the_prior_uncertainty() {
    let isam = run_sequence();
    let poses = circle_poses();
    let landmarks = cube_landmarks();

    let x0 = isam.estimate().pose(Symbol::Pose(0)).unwrap();
    let tangent = x0.local_from(&poses[0]);
    assert!(tangent.translation.norm() < 0.3, "x0 outside its prior");
    assert!(tangent.rotation.norm() < 0.1, "x0 outside its prior");

    let l0 = isam.estimate().point(Symbol::Landmark(0)).unwrap();
    assert!((l0 - landmarks[0]).norm() < 0.1, "l0 outside its prior");

    // With exact measurements the whole reconstruction lands on the truth.
    for (ix, truth) in poses.iter().enumerate() {
        let estimate = isam.estimate().pose(Symbol::Pose(ix)).unwrap();
        assert!(
            estimate.local_from(truth).norm() < 1e-3,
            "pose {} did not converge",
            ix
        );
    }
    for (ix, truth) in landmarks.iter().enumerate() {
        let estimate = isam.estimate().point(Symbol::Landmark(ix)).unwrap();
        assert!(
            (estimate - truth).norm() < 1e-3,
            "landmark {} did not converge",
            ix
        );
    }
}

#[test]
fn runs_are_deterministic() {
    let a = run_sequence();
    let b = run_sequence();
    assert_eq!(a.estimate(), b.estimate());
}

#[test]
fn extra_refinement_converges_and_estimate_reads_are_stable() {
    let mut isam = run_sequence();
    let first = isam.refine().unwrap();
    let second = isam.refine().unwrap();
    let third = isam.refine().unwrap();
    assert!(second.delta_norm <= first.delta_norm.max(1e-9));
    assert!(third.delta_norm < 1e-6, "refinement did not converge");
    assert!(third.mean_residual < 1e-6);

    let before = isam.estimate().clone();
    let again = isam.estimate().clone();
    assert_eq!(before, again);
}

#[test]
fn committing_the_first_frame_alone_is_rejected() {
    let poses = circle_poses();
    let landmarks = cube_landmarks();
    let mut graph = FactorGraph::new();
    let mut guesses = Values::new();
    push_frame(&mut graph, &mut guesses, 0, &poses, &landmarks);
    push_priors_and_landmark_guesses(&mut graph, &mut guesses, &poses, &landmarks);

    let mut isam = Isam::default();
    let error = isam.update(graph, guesses).unwrap_err();
    assert!(
        matches!(error, Error::UnderconstrainedVariable(symbol) if symbol.is_landmark()),
        "expected an underconstrained landmark, got {:?}",
        error
    );
}

#[test]
fn empty_landmark_set_allows_pose_priors_only() {
    let poses = circle_poses();
    let mut graph = FactorGraph::new();
    let mut guesses = Values::new();
    for (ix, pose) in poses.iter().take(3).enumerate() {
        graph.push(Factor::PosePrior {
            symbol: Symbol::Pose(ix),
            pose: *pose,
            noise: pose_prior_noise(),
        });
        guesses
            .insert_pose(Symbol::Pose(ix), pose_guess(pose))
            .unwrap();
    }

    let mut isam = Isam::default();
    isam.update(graph, guesses).unwrap();
    isam.refine().unwrap();

    assert_eq!(isam.estimate().points().count(), 0);
    for (ix, truth) in poses.iter().take(3).enumerate() {
        let estimate = isam.estimate().pose(Symbol::Pose(ix)).unwrap();
        let tangent = estimate.local_from(truth);
        assert!(tangent.translation.norm() < 0.3);
        assert!(tangent.rotation.norm() < 0.1);
    }
}

#[test]
fn guesses_must_cover_every_referenced_symbol() {
    let poses = circle_poses();
    let landmarks = cube_landmarks();
    let mut graph = FactorGraph::new();
    let mut guesses = Values::new();
    push_frame(&mut graph, &mut guesses, 0, &poses, &landmarks);
    // No landmark guesses were inserted.
    let mut isam = Isam::default();
    let error = isam.update(graph, guesses).unwrap_err();
    assert!(matches!(error, Error::UnknownVariable(symbol) if symbol.is_landmark()));
}

#[test]
fn batch_refinement_recovers_the_scene() {
    let poses = circle_poses();
    let landmarks = cube_landmarks();
    let mut graph = FactorGraph::new();
    let mut guesses = Values::new();
    for frame in 0..poses.len() {
        push_frame(&mut graph, &mut guesses, frame, &poses, &landmarks);
        if frame == 0 {
            push_priors_and_landmark_guesses(&mut graph, &mut guesses, &poses, &landmarks);
        }
    }

    let (refined, report) = batch_refine(&graph, &guesses).unwrap();
    assert!(report.termination.was_successful());
    for (ix, truth) in poses.iter().enumerate() {
        let estimate = refined.pose(Symbol::Pose(ix)).unwrap();
        assert!(
            estimate.local_from(truth).norm() < 1e-3,
            "pose {} did not converge",
            ix
        );
    }
    for (ix, truth) in landmarks.iter().enumerate() {
        let estimate = refined.point(Symbol::Landmark(ix)).unwrap();
        assert!((estimate - truth).norm() < 1e-3, "landmark {} did not converge", ix);
    }
}
