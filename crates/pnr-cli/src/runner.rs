//! Job runner: ties together the sample, resolution, and calculator.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pnr_compute::{ComputeBackend, CpuBackend, SerialBackend};
use pnr_core::{Measurement, ReflectivityCalculator, ReflectivityCurve, Residual};
use pnr_profile::SublayerProfile;
use pnr_resolution::ResolutionModel;
use serde::Serialize;

use crate::config::{DataConfig, JobConfig};

/// A calculated channel ready for export.
#[derive(Debug, Serialize)]
pub struct ChannelOutput {
    pub name: String,
    pub q: Vec<f64>,
    pub sigma: Vec<f64>,
    pub reflectivity: Vec<f64>,
    pub valid: Vec<bool>,
}

/// Comparison of the model with one measured curve.
#[derive(Debug, Serialize)]
pub struct FitOutput {
    pub file: String,
    pub chi_squared: f64,
    pub measured: Vec<f64>,
    pub error: Vec<f64>,
    pub residual: Vec<f64>,
    #[serde(flatten)]
    pub model: ChannelOutput,
}

/// Results from a job run.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub backend: String,
    pub channels: Vec<ChannelOutput>,
    pub fits: Vec<FitOutput>,
}

/// Run a job on the backend selected in its configuration.
pub fn run_job(job: &JobConfig) -> Result<RunOutput> {
    match (job.compute.backend.as_str(), job.compute.threads) {
        ("serial", _) => run_with(job, SerialBackend),
        ("cpu", Some(n)) => run_with(job, CpuBackend::with_threads(n)?),
        ("cpu", None) => run_with(job, CpuBackend::new()),
        (other, _) => anyhow::bail!("Unknown backend '{other}'. Valid backends: cpu, serial"),
    }
}

/// Run a job on `backend`.
pub fn run_with<B: ComputeBackend>(job: &JobConfig, backend: B) -> Result<RunOutput> {
    let info = backend.device_info();
    println!("Backend: {} ({} compute units)", info.name, info.compute_units);
    let calc = ReflectivityCalculator::new(backend, job.engine.clone());

    let profile = calc.profile(&job.stack)?;
    println!(
        "Sample: {} layers, {} sublayers, {:.1} Å of film",
        job.stack.len(),
        profile.len(),
        job.stack.film_thickness()
    );
    println!("Resolution: {}", job.resolution.name());

    let q = job.q.values();
    let sigma = job.resolution.sigma(&q)?;
    let mut channels = Vec::with_capacity(job.channels.len());
    for (i, config) in job.channels.iter().enumerate() {
        let channel = config.build(q.clone()).with_sigma(sigma.clone());
        let curve = calc
            .calculate(&job.stack, &channel)
            .with_context(|| format!("channel '{}'", channel.name))?;
        println!(
            "  [{}/{}] {}: {} points, {} invalid",
            i + 1,
            job.channels.len(),
            channel.name,
            curve.len(),
            curve.n_invalid()
        );
        channels.push(channel_output(channel.name, &sigma, &curve));
    }

    let residual = Residual::from_config(&job.engine);
    let mut fits = Vec::with_capacity(job.data.len());
    for data in &job.data {
        let measurement = load_measurement(data, &job.resolution)?;
        let sigma = measurement.channel.sigma.clone().unwrap_or_default();
        let curve = calc
            .calculate(&job.stack, &measurement.channel)
            .with_context(|| format!("data file {}", data.file.display()))?;
        let chi = residual.evaluate(&curve, &measurement)?;
        let chi_squared = chi.mapv(|c| c * c).mean().unwrap_or(0.0);
        println!(
            "  {} vs {}: chi² = {:.4}",
            measurement.channel.name,
            data.file.display(),
            chi_squared
        );
        fits.push(FitOutput {
            file: data.file.display().to_string(),
            chi_squared,
            measured: measurement.r,
            error: measurement.e,
            residual: chi.to_vec(),
            model: channel_output(measurement.channel.name, &sigma, &curve),
        });
    }

    Ok(RunOutput {
        backend: info.name,
        channels,
        fits,
    })
}

fn channel_output(name: String, sigma: &[f64], curve: &ReflectivityCurve) -> ChannelOutput {
    ChannelOutput {
        name,
        q: curve.q.to_vec(),
        sigma: sigma.to_vec(),
        reflectivity: curve.values.to_vec(),
        valid: curve.valid.clone(),
    }
}

/// Read a `Q R E [σQ]` file. Blank lines and lines starting with `#` are
/// skipped; σ comes from `resolution` when the fourth column is missing.
pub fn load_measurement(data: &DataConfig, resolution: &dyn ResolutionModel) -> Result<Measurement> {
    let text = std::fs::read_to_string(&data.file).with_context(|| format!("reading {}", data.file.display()))?;
    let columns = parse_columns(&text).with_context(|| format!("parsing {}", data.file.display()))?;
    let [q, r, e, dq] = columns;

    let sigma = if dq.len() == q.len() {
        dq
    } else {
        resolution.sigma(&q)?
    };
    let channel = data.channel.build(q).with_sigma(sigma);
    log::debug!("loaded {} points for '{}'", channel.len(), channel.name);
    Ok(Measurement::new(channel, r, e))
}

/// Split numeric text into the columns `Q R E σQ`. The fourth column is
/// empty unless every row carries it.
fn parse_columns(text: &str) -> Result<[Vec<f64>; 4]> {
    let mut columns: [Vec<f64>; 4] = Default::default();
    let mut with_sigma = true;
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("line {}", lineno + 1))?;
        if values.len() < 3 {
            anyhow::bail!("line {}: expected at least 3 columns, found {}", lineno + 1, values.len());
        }
        with_sigma &= values.len() >= 4;
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }
    if columns[0].is_empty() {
        anyhow::bail!("no data rows");
    }
    if !with_sigma {
        columns[3].clear();
    }
    Ok(columns)
}

/// Write calculated channels to a CSV file with a metadata header.
pub fn write_curves_csv(output: &RunOutput, path: &Path, job: &JobConfig) -> Result<()> {
    let mut file = create(path)?;

    writeln!(file, "# PNR reflectivity")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# backend: {}", output.backend)?;
    writeln!(file, "# resolution: {} ({:?})", job.resolution.name(), job.engine.resolution_mode)?;
    for (i, layer) in job.stack.layers().iter().enumerate() {
        writeln!(
            file,
            "# layer {i} '{}': d={} nsld={:e}{:+e}i msld={:e}@({}, {}) sigma={}",
            layer.name,
            layer.thickness,
            layer.nsld_real,
            layer.nsld_imag,
            layer.msld.rho,
            layer.msld.theta,
            layer.msld.phi,
            layer.roughness
        )?;
    }
    writeln!(file, "#")?;
    writeln!(file, "channel,q,sigma,reflectivity,valid")?;

    for ch in &output.channels {
        for i in 0..ch.q.len() {
            writeln!(
                file,
                "{},{:.6e},{:.6e},{:.6e},{}",
                ch.name, ch.q[i], ch.sigma[i], ch.reflectivity[i], u8::from(ch.valid[i])
            )?;
        }
    }

    println!("Curves written to: {}", path.display());
    Ok(())
}

/// Write model/data comparisons to a CSV file.
pub fn write_fits_csv(fits: &[FitOutput], path: &Path) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "# PNR reflectivity: model vs data")?;
    for fit in fits {
        writeln!(file, "# {} ({}): chi2 = {:.6}", fit.model.name, fit.file, fit.chi_squared)?;
    }
    writeln!(file, "#")?;
    writeln!(file, "channel,q,sigma,measured,error,model,residual,valid")?;
    for fit in fits {
        let m = &fit.model;
        for i in 0..m.q.len() {
            writeln!(
                file,
                "{},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{:.6e},{}",
                m.name,
                m.q[i],
                m.sigma.get(i).copied().unwrap_or(0.0),
                fit.measured[i],
                fit.error[i],
                m.reflectivity[i],
                fit.residual[i],
                u8::from(m.valid[i])
            )?;
        }
    }
    println!("Fits written to: {}", path.display());
    Ok(())
}

/// Write the whole run output to a JSON file.
pub fn write_json(output: &RunOutput, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(output).context("JSON serialisation")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    println!("Results (JSON) written to: {}", path.display());
    Ok(())
}

/// Write a sublayer profile: one row per slab, from the incoming medium down.
pub fn write_profile_csv(profile: &SublayerProfile, path: &Path) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "# PNR sublayer profile")?;
    writeln!(file, "# {} sublayers", profile.len())?;
    writeln!(file, "#")?;
    writeln!(file, "depth,thickness,nsld_real,nsld_imag,msld_rho,msld_theta,msld_phi,parent")?;
    for ((slab, parent), depth) in profile.iter().zip(profile.depths()) {
        writeln!(
            file,
            "{:.4},{:.4},{:.6e},{:.6e},{:.6e},{:.2},{:.2},{}",
            depth,
            slab.thickness,
            slab.nsld_real,
            slab.nsld_imag,
            slab.msld.rho,
            slab.msld.theta,
            slab.msld.phi,
            parent
        )?;
    }
    println!("Profile written to: {}", path.display());
    Ok(())
}

fn create(path: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(std::io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use approx::assert_abs_diff_eq;

    const JOB: &str = r#"
        [[layer]]
        thickness = inf
        nsld_real = 0.0

        [[layer]]
        thickness = 150.0
        nsld_real = 6.0e-6
        msld = { rho = 1.0e-6, theta = 90.0, phi = 90.0 }

        [[layer]]
        thickness = inf
        nsld_real = 2.07e-6

        [q]
        range = [0.005, 0.1]
        points = 40

        [resolution]
        kind = "relative"
        fraction = 0.02
    "#;

    #[test]
    fn test_parse_columns() {
        let text = "# Q R E dQ\n0.01 0.9 0.01 0.0002\n\n0.02,0.1,0.005,0.0004\n";
        let [q, r, e, dq] = parse_columns(text).unwrap();
        assert_eq!(q, vec![0.01, 0.02]);
        assert_eq!(r, vec![0.9, 0.1]);
        assert_eq!(e, vec![0.01, 0.005]);
        assert_eq!(dq, vec![0.0002, 0.0004]);

        let [_, _, _, dq] = parse_columns("0.01 0.9 0.01\n0.02 0.1 0.005 0.0004\n").unwrap();
        assert!(dq.is_empty());

        assert!(parse_columns("0.01 0.9\n").is_err());
        assert!(parse_columns("0.01 abc 0.1\n").is_err());
        assert!(parse_columns("# only a header\n").is_err());
    }

    #[test]
    fn test_backends_give_same_output() {
        let job = parse_config(JOB).unwrap();
        let serial = run_with(&job, SerialBackend).unwrap();
        let cpu = run_with(&job, CpuBackend::with_threads(2).unwrap()).unwrap();
        assert_eq!(serial.channels.len(), 4);
        for (a, b) in serial.channels.iter().zip(&cpu.channels) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.reflectivity, b.reflectivity);
        }
        assert!(serial.fits.is_empty());
    }

    #[test]
    fn test_data_file_round_trip_gives_zero_residual() {
        let job = parse_config(JOB).unwrap();
        let output = run_with(&job, SerialBackend).unwrap();
        let up = &output.channels[0];

        let dir = std::env::temp_dir().join(format!("pnr-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("up.dat");
        let mut text = String::from("# Q R E dQ\n");
        for i in 0..up.q.len() {
            let r = up.reflectivity[i];
            text.push_str(&format!("{:e} {:e} {:e} {:e}\n", up.q[i], r, 0.05 * r, up.sigma[i]));
        }
        std::fs::write(&path, text).unwrap();

        let with_data = format!("{JOB}\n[[data]]\nfile = {:?}\nspin = \"++\"\n", path.display().to_string());
        let job = parse_config(&with_data).unwrap();
        let output = run_with(&job, SerialBackend).unwrap();
        assert_eq!(output.fits.len(), 1);
        let fit = &output.fits[0];
        assert_eq!(fit.model.name, "++");
        assert!(fit.chi_squared < 1e-12, "chi2 = {}", fit.chi_squared);

        write_fits_csv(&output.fits, &dir.join("fits.csv")).unwrap();
        write_json(&output, &dir.join("run.json")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("run.json")).unwrap()).unwrap();
        assert_abs_diff_eq!(json["fits"][0]["chi_squared"].as_f64().unwrap(), fit.chi_squared);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
