use capsula::prelude::*;
use serde::{Deserialize, Serialize};

/// Everything which is needed to run the colony besides the simulation setup itself
#[derive(Clone, Debug, Deserialize, Serialize)]
struct ColonyParameters {
    setup: SimulationSetup,
    t_max: f64,
    save_freq: usize,
    output_directory: std::path::PathBuf,
    show_progressbar: bool,
}

impl Default for ColonyParameters {
    fn default() -> Self {
        let mut setup = SimulationSetup::default();
        setup.domain.max = [60.0, 60.0, 1.0];
        setup.domain.open_faces = vec![Face::XMin, Face::XMax];
        setup.domain.flows = vec![
            Flow {
                face: Face::XMin,
                force: [-2.0, 0.0, 0.0].into(),
            },
            Flow {
                face: Face::XMax,
                force: [2.0, 0.0, 0.0].into(),
            },
        ];
        setup.n_initial = 4;
        setup.settings.parallel = true;
        ColonyParameters {
            setup,
            t_max: 8.0,
            save_freq: 20,
            output_directory: "out/colony".into(),
            show_progressbar: true,
        }
    }
}

fn read_parameters() -> Result<ColonyParameters, SetupError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let file = std::fs::File::open(&path).map_err(StorageError::from)?;
            let parameters: ColonyParameters =
                serde_json::from_reader(std::io::BufReader::new(file))
                    .map_err(|e| SetupError(format!("Could not parse {path}: {e}")))?;
            parameters.setup.validate()?;
            Ok(parameters)
        }
        None => Ok(ColonyParameters::default()),
    }
}

fn main() -> Result<(), SimulationError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_line_number(true)
        .init();

    let parameters = read_parameters()?;
    let setup = &parameters.setup;
    let mut simulation = Simulation::new(setup)?;
    let exporter = CsvExporter::open_or_create(&parameters.output_directory)?;
    exporter.write_tick(0, simulation.capsules())?;
    parameters
        .setup
        .to_json_file(parameters.output_directory.join("setup.json"))?;

    let mut stepper = FixedStepsize::from_partial_save_freq(
        0.0,
        setup.settings.dt,
        parameters.t_max,
        parameters.save_freq,
    )?;
    let mut bar = match parameters.show_progressbar {
        true => Some(stepper.initialize_bar()?),
        false => None,
    };

    tracing::info!(
        n_capsules = simulation.capsules().len(),
        n_iterations = stepper.n_iterations(),
        "starting colony"
    );
    while let Some(next) = stepper.advance()? {
        let report = simulation.tick()?;
        if !report.relaxation.converged {
            tracing::warn!(
                tick = report.tick,
                residual = report.relaxation.residual,
                "relaxation did not converge"
            );
        }
        if let Some(TimeEvent::Save) = next.event {
            let path = exporter.write_tick(report.tick, simulation.capsules())?;
            tracing::info!(
                time = next.time,
                n_capsules = report.n_capsules,
                path = %path.display(),
                "saved"
            );
        }
        if let Some(bar) = bar.as_mut() {
            stepper.update_bar(bar)?;
        }
    }
    tracing::info!(
        n_capsules = simulation.capsules().len(),
        time = simulation.time(),
        "finished colony"
    );
    Ok(())
}
