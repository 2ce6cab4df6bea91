//! Controls how the simulation time is advanced by an outer driver

use kdam::BarExt;
use serde::{Deserialize, Serialize};

use capsula_concepts::TimeError;

/// A [TimeEvent] describes that a certain action is to be executed after the next tick.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum TimeEvent {
    /// Export the current population.
    Save,
}

/// Represents the next time point which is returned by the [TimeStepper::advance] method.
///
/// The absolute time value $t$ is only meant for annotating exported results.
/// Growth and relaxation use the increment.
#[derive(Clone, Debug)]
pub struct NextTimePoint<F> {
    /// Time increment $dt$
    pub increment: F,
    /// Time value $t$
    pub time: F,
    /// Current iteration
    pub iteration: usize,
    /// Event at this iteration, or None
    pub event: Option<TimeEvent>,
}

/// Increments time of the simulation
pub trait TimeStepper<F> {
    /// Advances the time stepper to the next time point. Also returns if there is an event
    /// scheduled to take place and the next time value and iteration number
    #[must_use]
    fn advance(&mut self) -> Result<Option<NextTimePoint<F>>, TimeError>;

    /// Creates a bar that tracks the simulation progress
    fn initialize_bar(&self) -> Result<kdam::Bar, TimeError>;

    /// Update a given bar to show the current simulation state
    fn update_bar(&self, bar: &mut kdam::Bar) -> Result<(), std::io::Error>;
}

/// Time stepping with a fixed time length
///
/// This time-stepper increments the time variable by the same length.
/// A [TimeEvent::Save] is emitted every `save_freq` iterations.
/// ```
/// # use capsula_core::time::{FixedStepsize, TimeStepper, TimeEvent};
/// let mut stepper = FixedStepsize::from_partial_save_freq(0.0, 0.01, 1.0, 10).unwrap();
/// assert_eq!(stepper.n_iterations(), 100);
/// let next = stepper.advance().unwrap().unwrap();
/// assert_eq!(next.iteration, 1);
/// assert_eq!(next.event, None);
/// ```
#[derive(Clone, Deserialize, Serialize)]
pub struct FixedStepsize<F> {
    // The stepsize which was fixed
    dt: F,
    t0: F,
    save_freq: usize,
    current_time: F,
    current_iteration: usize,
    maximum_iterations: usize,
}

impl<F> FixedStepsize<F>
where
    F: num::Float + num::ToPrimitive + num::FromPrimitive,
{
    /// Construct the stepper from initial time, increment, final time and the number of
    /// iterations between two save points.
    pub fn from_partial_save_freq(
        t0: F,
        dt: F,
        t_max: F,
        save_freq: usize,
    ) -> Result<Self, TimeError> {
        if !(dt > F::zero()) {
            return Err(TimeError("Time increment must be positive".to_owned()));
        }
        if t_max < t0 {
            return Err(TimeError(
                "Invalid time configuration! Final time point is before starting time point."
                    .to_owned(),
            ));
        }
        if save_freq == 0 {
            return Err(TimeError("Save frequency must be at least 1".to_owned()));
        }
        let maximum_iterations = F::to_usize(&((t_max - t0) / dt).round())
            .ok_or(TimeError("Could not round value to usize".to_owned()))?;
        Ok(Self {
            dt,
            t0,
            save_freq,
            current_time: t0,
            current_iteration: 0,
            maximum_iterations,
        })
    }

    /// Construct the stepper from initial time, increment, number of steps and save interval.
    pub fn from_partial_save_steps(
        t0: F,
        dt: F,
        n_steps: u64,
        save_interval: u64,
    ) -> Result<Self, TimeError> {
        let n = F::from_u64(n_steps).ok_or(TimeError(format!(
            "Could not convert n_steps={n_steps} to type: {}",
            std::any::type_name::<F>()
        )))?;
        let save_freq = usize::try_from(save_interval)
            .map_err(|e| TimeError(format!("Invalid save interval {save_interval}: {e}")))?;
        Self::from_partial_save_freq(t0, dt, t0 + n * dt, save_freq)
    }

    /// Total number of iterations
    pub fn n_iterations(&self) -> usize {
        self.maximum_iterations
    }

    /// Current time value
    pub fn current_time(&self) -> F {
        self.current_time
    }
}

impl<F> TimeStepper<F> for FixedStepsize<F>
where
    F: num::Float + num::FromPrimitive,
{
    fn advance(&mut self) -> Result<Option<NextTimePoint<F>>, TimeError> {
        if self.current_iteration >= self.maximum_iterations {
            return Ok(None);
        }
        self.current_iteration += 1;
        self.current_time = F::from_usize(self.current_iteration).ok_or(TimeError(
            "Error when casting from usize to floating point value".to_owned(),
        ))? * self.dt
            + self.t0;
        let event = if self.current_iteration % self.save_freq == 0 {
            Some(TimeEvent::Save)
        } else {
            None
        };
        Ok(Some(NextTimePoint {
            increment: self.dt,
            time: self.current_time,
            iteration: self.current_iteration,
            event,
        }))
    }

    fn initialize_bar(&self) -> Result<kdam::Bar, TimeError> {
        let bar_format = "\
        {desc}{percentage:3.0}%|{animation}| \
        {count}/{total} \
        [{elapsed}, \
        {rate:.2}{unit}/s{postfix}]";
        Ok(kdam::BarBuilder::default()
            .total(self.maximum_iterations)
            .bar_format(bar_format)
            .dynamic_ncols(true)
            .build()?)
    }

    fn update_bar(&self, bar: &mut kdam::Bar) -> Result<(), std::io::Error> {
        let _ = bar.update(1)?;
        Ok(())
    }
}

#[cfg(test)]
mod test_time_stepper {
    use super::*;

    #[test]
    fn initialization() {
        let stepper = FixedStepsize::from_partial_save_freq(1.0, 0.2, 3.0, 2).unwrap();
        assert_eq!(1.0, stepper.current_time);
        assert_eq!(0.2, stepper.dt);
        assert_eq!(0, stepper.current_iteration);
        assert_eq!(10, stepper.n_iterations());
    }

    #[test]
    fn reject_wrong_configuration() {
        assert!(FixedStepsize::from_partial_save_freq(10.0, 0.2, 3.0, 1).is_err());
        assert!(FixedStepsize::from_partial_save_freq(0.0, 0.0, 3.0, 1).is_err());
        assert!(FixedStepsize::from_partial_save_freq(0.0, 0.1, 3.0, 0).is_err());
    }

    #[test]
    fn stepping_emits_save_events() {
        let t0 = 0.0;
        let dt = 0.1;
        let mut stepper = FixedStepsize::from_partial_save_freq(t0, dt, 1.0, 5).unwrap();
        for i in 1..11 {
            let next = stepper.advance().unwrap().unwrap();
            assert_eq!(dt, next.increment);
            assert_eq!(t0 + i as f64 * dt, next.time);
            assert_eq!(i, next.iteration);
            if i == 5 || i == 10 {
                assert_eq!(Some(TimeEvent::Save), next.event);
            } else {
                assert_eq!(None, next.event);
            }
        }
        assert!(stepper.advance().unwrap().is_none());
    }

    #[test]
    fn steps_from_count() {
        let stepper = FixedStepsize::<f32>::from_partial_save_steps(0.0, 0.5, 40, 4).unwrap();
        let all_times = Vec::from_iter({
            let mut stepper = stepper.clone();
            std::iter::from_fn(move || stepper.advance().unwrap())
        });
        assert_eq!(all_times.len(), 40);
        assert_eq!(all_times.iter().filter(|t| t.event.is_some()).count(), 10);
    }
}
