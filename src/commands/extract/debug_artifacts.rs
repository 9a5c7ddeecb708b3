use super::*;

/// Intermediate pipeline output written with `--debug` for inspecting how
/// the HTML was read.
#[derive(Debug)]
pub(super) struct DebugArtifacts {
    dir: PathBuf,
}

impl DebugArtifacts {
    pub(super) fn new(dir: &Path) -> Result<Self> {
        ensure_directory(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub(super) fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        write_json_pretty(&path, value)?;
        debug!(path = %path.display(), "wrote debug artifact");
        Ok(())
    }

    pub(super) fn write_manifest(
        &self,
        args: &ExtractArgs,
        config: &ExtractConfig,
        extraction: &Extraction,
    ) -> Result<()> {
        let manifest = DebugManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            input_path: args.cdbk_html.display().to_string(),
            input_sha256: sha256_file(&args.cdbk_html)?,
            output_path: args.output.display().to_string(),
            profile: config.profile.as_str().to_string(),
            counts: DebugCounts {
                fragments: extraction.fragment_count,
                lines: extraction.line_count,
                discarded_lines: extraction.discarded,
                unattached_lines: extraction.unattached,
                records: extraction.records.len(),
            },
        };

        self.write("debug_manifest.json", &manifest)?;
        info!(dir = %self.dir.display(), "wrote debug artifacts");
        Ok(())
    }
}
