use crate::dataset::{point_guess, pose_guess, Observations, SyntheticScene};
use crate::export::Visualizer;
use crate::settings::SandboxSettings;
use isam_core::{
    nalgebra::DVector, Factor, FactorGraph, NoiseModel, Symbol, Values,
};
use isam_optimize::{batch_refine, Isam, IsamParams};
use log::info;
use std::error::Error;
use std::time::Duration;

/// Where the driver is in the incremental schedule.
///
/// The first frame only primes the pending batch: landmarks have a single
/// observation at that point, so committing would leave them
/// underconstrained. Every later frame commits the accumulated batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriverState {
    /// No frame has been processed yet.
    Init,
    /// The first frame primed the pending batch without committing it.
    FirstFrame,
    /// Every new frame commits the pending batch.
    SteadyState,
}

/// Owns the whole run: the synthetic scene, the pending batch, and the
/// smoother. Single threaded; each frame finishes before the next begins.
pub struct Driver<V> {
    settings: SandboxSettings,
    scene: SyntheticScene,
    observations: Observations,
    isam: Isam,
    graph: FactorGraph,
    guesses: Values,
    state: DriverState,
    visualizer: V,
}

impl<V: Visualizer> Driver<V> {
    pub fn new(settings: SandboxSettings, visualizer: V) -> Self {
        Self {
            settings,
            scene: SyntheticScene::generate(&settings),
            observations: Observations::new(&settings),
            isam: Isam::new(IsamParams {
                relinearize_threshold: settings.relinearize_threshold,
                relinearize_skip: settings.relinearize_skip,
            }),
            graph: FactorGraph::new(),
            guesses: Values::new(),
            state: DriverState::Init,
            visualizer,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn isam(&self) -> &Isam {
        &self.isam
    }

    /// Processes every frame of the synthetic sequence.
    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        for frame in 0..self.scene.poses.len() {
            self.step(frame)?;
            if self.settings.frame_delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.settings.frame_delay_ms));
            }
        }
        Ok(())
    }

    /// Processes one frame: accumulate its observations and guesses, and
    /// from the second frame onward commit the batch.
    pub fn step(&mut self, frame: usize) -> Result<(), Box<dyn Error>> {
        self.accumulate(frame)?;
        match self.state {
            DriverState::Init => {
                // Landmarks are observed once so far; priors and guesses are
                // primed and the commit waits for the second observation.
                self.prime_first_frame()?;
                self.state = DriverState::FirstFrame;
            }
            DriverState::FirstFrame | DriverState::SteadyState => {
                self.commit(frame)?;
                self.state = DriverState::SteadyState;
            }
        }
        Ok(())
    }

    /// A final batch polish over everything the smoother accumulated,
    /// rendered as one last snapshot.
    pub fn finalize(&mut self) -> Result<(), Box<dyn Error>> {
        if self.isam.update_count() == 0 {
            return Ok(());
        }
        let mut graph = FactorGraph::new();
        graph.extend(self.isam.factors().cloned());
        let (refined, report) = batch_refine(&graph, self.isam.estimate())?;
        info!(
            "batch polish over {} factors finished with cost {:.3e}",
            graph.len(),
            report.objective_function
        );
        println!("****************************************************");
        println!("Final:");
        print_values(&refined);
        self.visualizer.render(self.scene.poses.len(), &refined)?;
        Ok(())
    }

    /// Adds this frame's observations and pose guess to the pending batch.
    /// With no landmarks to observe, each pose is anchored by its own prior
    /// instead so the run stays pose-only.
    fn accumulate(&mut self, frame: usize) -> Result<(), Box<dyn Error>> {
        let pose_truth = self.scene.poses[frame];
        if self.scene.landmarks.is_empty() {
            self.graph.push(Factor::PosePrior {
                symbol: Symbol::Pose(frame),
                pose: pose_truth,
                noise: self.pose_prior_noise(),
            });
        }
        for (ix, landmark) in self.scene.landmarks.iter().enumerate() {
            self.graph.push(Factor::Projection {
                pose: Symbol::Pose(frame),
                landmark: Symbol::Landmark(ix),
                pixel: self.observations.pixel(&pose_truth, landmark)?,
                intrinsics: crate::dataset::intrinsics(&self.settings),
                noise: NoiseModel::isotropic(self.settings.pixel_sigma),
            });
        }
        self.guesses
            .insert_pose(Symbol::Pose(frame), pose_guess(&pose_truth))?;
        Ok(())
    }

    /// The first frame fixes the gauge: a prior on the first pose anchors
    /// the coordinate frame, a prior on the first landmark anchors the
    /// scale, and every landmark receives its initial guess.
    fn prime_first_frame(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.scene.landmarks.is_empty() {
            self.graph.push(Factor::PosePrior {
                symbol: Symbol::Pose(0),
                pose: self.scene.poses[0],
                noise: self.pose_prior_noise(),
            });
            self.graph.push(Factor::PointPrior {
                symbol: Symbol::Landmark(0),
                point: self.scene.landmarks[0],
                noise: NoiseModel::isotropic(self.settings.point_prior_sigma),
            });
        }
        for (ix, landmark) in self.scene.landmarks.iter().enumerate() {
            self.guesses
                .insert_point(Symbol::Landmark(ix), point_guess(landmark))?;
        }
        Ok(())
    }

    fn commit(&mut self, frame: usize) -> Result<(), Box<dyn Error>> {
        let stats = self.isam.update(
            std::mem::take(&mut self.graph),
            std::mem::take(&mut self.guesses),
        )?;
        info!(
            "frame {}: {} factors over {} variables, mean residual {:.3e}",
            frame, stats.factors, stats.variables, stats.mean_residual
        );
        for _ in 0..self.settings.extra_refine_passes {
            self.isam.refine()?;
        }
        println!("****************************************************");
        println!("Frame {}:", frame);
        print_values(self.isam.estimate());
        self.visualizer.render(frame, self.isam.estimate())?;
        Ok(())
    }

    fn pose_prior_noise(&self) -> NoiseModel {
        let t = self.settings.pose_prior_translation_sigma;
        let r = self.settings.pose_prior_rotation_sigma;
        NoiseModel::diagonal(DVector::from_vec(vec![t, t, t, r, r, r]))
    }
}

fn print_values(values: &Values) {
    for (symbol, pose) in values.poses() {
        let t = pose.translation();
        let (roll, pitch, yaw) = pose.rotation().euler_angles();
        println!(
            "{}: t = [{:.6}, {:.6}, {:.6}], rpy = [{:.6}, {:.6}, {:.6}]",
            symbol, t.x, t.y, t.z, roll, pitch, yaw
        );
    }
    for (symbol, point) in values.points() {
        println!("{}: [{:.6}, {:.6}, {:.6}]", symbol, point.x, point.y, point.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::NullVisualizer;

    #[test]
    fn first_frame_never_commits() {
        let mut driver = Driver::new(SandboxSettings::default(), NullVisualizer);
        assert_eq!(driver.state(), DriverState::Init);
        driver.step(0).unwrap();
        assert_eq!(driver.state(), DriverState::FirstFrame);
        assert_eq!(driver.isam().update_count(), 0);
        driver.step(1).unwrap();
        assert_eq!(driver.state(), DriverState::SteadyState);
        assert_eq!(driver.isam().update_count(), 1);
    }

    #[test]
    fn full_run_is_deterministic() {
        let run = || {
            let mut driver = Driver::new(SandboxSettings::default(), NullVisualizer);
            driver.run().unwrap();
            driver.isam().estimate().clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn empty_landmark_set_produces_pose_only_estimates() {
        let settings = SandboxSettings {
            landmark_count: 0,
            ..SandboxSettings::default()
        };
        let mut driver = Driver::new(settings, NullVisualizer);
        driver.run().unwrap();
        driver.finalize().unwrap();
        assert_eq!(driver.isam().estimate().points().count(), 0);
        assert_eq!(driver.isam().estimate().poses().count(), 8);
    }

    #[test]
    fn full_run_recovers_the_scene() {
        let mut driver = Driver::new(SandboxSettings::default(), NullVisualizer);
        driver.run().unwrap();
        let scene = SyntheticScene::generate(&SandboxSettings::default());
        for (ix, truth) in scene.poses.iter().enumerate() {
            let estimate = driver.isam().estimate().pose(Symbol::Pose(ix)).unwrap();
            assert!(estimate.local_from(truth).norm() < 1e-3);
        }
        for (ix, truth) in scene.landmarks.iter().enumerate() {
            let estimate = driver
                .isam()
                .estimate()
                .point(Symbol::Landmark(ix))
                .unwrap();
            assert!((estimate - truth).norm() < 1e-3);
        }
    }
}
