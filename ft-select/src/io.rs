//! Reading trace files and writing selection results.
use std::fs::{
    self,
    File,
};
use std::io::Write;
use std::path::{
    Path,
    PathBuf,
};
use std::time::SystemTime;

use anyhow::{
    Context,
    Result,
};
use chrono::{
    DateTime,
    Utc,
};
use ft_core::BidirectionalTrace;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::json;
use tracing::{
    debug,
    instrument,
    warn,
};

/// Name of the file the selected traces are written to.
pub const SELECTED_TRACES_FILE: &str = "selected_traces.json";
/// Name of the run metadata file.
pub const METADATA_FILE: &str = "metadata.json";

/// Decodes a `MessagePack` trace file. Structs are maps and addresses are strings, matching what
/// [`to_msgpack`] writes.
fn from_msgpack(bytes: &[u8]) -> Result<Vec<BidirectionalTrace>> {
    let mut de = rmp_serde::Deserializer::new(bytes).with_human_readable();
    Ok(Vec::<BidirectionalTrace>::deserialize(&mut de)?)
}

/// Encodes traces as `MessagePack`.
///
/// # Errors
///
/// Fails if a trace cannot be serialized.
pub fn to_msgpack(traces: &[BidirectionalTrace]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    traces.serialize(&mut rmp_serde::Serializer::new(&mut buf).with_struct_map().with_human_readable())?;
    Ok(buf)
}

/// Loads the bidirectional traces stored in `path`, as JSON or `MessagePack`.
///
/// # Errors
///
/// Fails if the file cannot be read or decodes as neither format.
#[instrument]
pub fn load_traces(path: &Path) -> Result<Vec<BidirectionalTrace>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let traces = match serde_json::from_slice(&bytes) {
        Ok(traces) => traces,
        Err(json_err) => {
            debug!("not JSON ({json_err}), trying MessagePack");
            from_msgpack(&bytes).with_context(|| format!("decoding {} (JSON error: {json_err})", path.display()))?
        },
    };
    debug!(count = traces.len(), "loaded traces");
    Ok(traces)
}

/// Creates a timestamped directory under `base_dir` and writes the run metadata into it.
///
/// # Errors
///
/// Fails if the directory or the metadata file cannot be written.
#[instrument]
pub fn create_timestamped_output_dir(base_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(base_dir)?;

    let now: DateTime<Utc> = SystemTime::now().into();
    let timestamp = now.to_rfc3339().replace([':', '.', '+'], "-");
    let output_dir = base_dir.join(timestamp);
    if output_dir.exists() {
        warn!("output directory {} already exists, reusing it", output_dir.display());
    }
    fs::create_dir_all(&output_dir)?;

    let metadata = json!({
        "timestamp": now.to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "command_args": std::env::args().collect::<Vec<_>>(),
    });
    let mut file = File::create(output_dir.join(METADATA_FILE))?;
    file.write_all(serde_json::to_string_pretty(&metadata)?.as_bytes())?;

    Ok(output_dir)
}

/// Writes `traces` as pretty JSON into `output_dir` and returns the file path.
///
/// # Errors
///
/// Fails if the file cannot be written.
#[instrument(skip(traces), fields(count = traces.len()))]
pub fn write_selected_traces(output_dir: &Path, traces: &[BidirectionalTrace]) -> Result<PathBuf> {
    let path = output_dir.join(SELECTED_TRACES_FILE);
    let file = File::create(&path)?;
    serde_json::to_writer_pretty(file, traces)?;
    debug!("selection written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use ft_core::testutils::*;
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_load_json_and_msgpack(bidirectional_trace: BidirectionalTrace) {
        let dir = tempfile::tempdir().unwrap();
        let traces = vec![bidirectional_trace.clone(), denied(bidirectional_trace.forward_flow(), &["A"])];

        let json_path = dir.path().join("traces.json");
        fs::write(&json_path, serde_json::to_vec(&traces).unwrap()).unwrap();
        let msgpack_path = dir.path().join("traces.msgpack");
        fs::write(&msgpack_path, to_msgpack(&traces).unwrap()).unwrap();

        assert_eq!(load_traces(&json_path).unwrap(), traces);
        assert_eq!(load_traces(&msgpack_path).unwrap(), traces);
    }

    #[rstest]
    fn test_load_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        fs::write(&path, b"\xc1not a trace").unwrap();
        assert!(load_traces(&path).is_err());
    }

    #[rstest]
    fn test_output_dir_has_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = create_timestamped_output_dir(&dir.path().join("runs")).unwrap();
        let metadata: serde_json::Value =
            serde_json::from_slice(&fs::read(output_dir.join(METADATA_FILE)).unwrap()).unwrap();
        assert_eq!(metadata["version"], env!("CARGO_PKG_VERSION"));
        assert!(output_dir.starts_with(dir.path().join("runs")));
    }
}
