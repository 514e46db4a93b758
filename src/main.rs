use generic_problem::initialization::{initialize_probes, initialize_problem, sample_problem};
use generic_problem::io::param_parser::ProblemFileParser;
use generic_problem::io::write_to_csv::write_to_csv;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let input = args.next().unwrap_or_else(|| "inputs/problem.json".to_string());
    let output = args.next().unwrap_or_else(|| "boundary_values.csv".to_string());

    let file = ProblemFileParser::parse(&input)?;
    let problem = initialize_problem(&file)?;
    log::info!(
        "{} configured from {input}: scalar {}, zero source {}",
        problem.name(),
        problem.is_scalar(),
        problem.is_source_zero()
    );
    let probes = initialize_probes(&file.probes)?;
    let samples = sample_problem(problem.as_ref(), &probes, file.time)?;
    write_to_csv(&samples, &output)?;
    log::info!("wrote {} probes at t = {} to {output}", file.probes.len(), file.time);
    Ok(())
}
