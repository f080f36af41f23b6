use scrins::trace::{read_trace, TraceEvent};

fn usage() -> &'static str {
    "Usage:
  scrins_trace info <trace.jsonl>"
}

fn info(path: &str) -> Result<(), String> {
    let events = read_trace(path).map_err(|err| format!("failed to read trace '{}': {err}", path))?;

    let mut steps = Vec::new();
    let mut closed = None;
    for event in events {
        match event {
            TraceEvent::Header(h) => {
                let c = &h.case;
                println!("case: {} (format v{})", c.name, h.format_version);
                println!(
                    "  grid: {}x{}x{} cells, extent {:?}, {} obstacle cells",
                    c.resolution[0], c.resolution[1], c.resolution[2], c.extent, c.obstacle_cells
                );
                println!(
                    "  dt {:e}, {} steps planned, temperature: {}",
                    c.config.dt, c.config.steps, c.temperature
                );
            }
            TraceEvent::Step(s) => steps.push(s),
            TraceEvent::Footer(f) => closed = Some(f),
        }
    }

    let Some(last) = steps.last() else {
        println!("no steps recorded");
        return Ok(());
    };
    let worst_err = steps.iter().map(|s| s.max_error_after).fold(0.0_f64, f64::max);
    let worst_cfl = steps.iter().map(|s| s.cfl).fold(0.0_f64, f64::max);
    let unconverged = steps.iter().filter(|s| !s.pressure.converged()).count();
    let mean_iters =
        steps.iter().map(|s| s.pressure.iterations as f64).sum::<f64>() / steps.len() as f64;

    println!("steps: {} (last t = {:.5})", steps.len(), last.time);
    println!("  max volume error after correction: {:.3e}", worst_err);
    println!("  max CFL: {:.3}", worst_cfl);
    println!(
        "  pressure: {:.1} iterations on average, {} unconverged",
        mean_iters, unconverged
    );
    if closed.is_none() {
        println!("  (trace has no footer; run did not finish)");
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [cmd, path] if cmd == "info" => info(path),
        _ => Err(usage().to_string()),
    };
    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
