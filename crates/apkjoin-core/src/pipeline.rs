//! The merge pipeline.
//!
//! Opening → Classifying → Validating → Extracting → Merging → Packaging →
//! Signing. Classification fans out over a bounded pool; every other stage
//! is a barrier. Nothing is extracted before validation has passed, and the
//! work area is removed when the run ends, however it ends.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apkjoin_schema::{ANDROID_MANIFEST, ContainerManifest, ManifestDescriptor, PackageMember};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aapt::{Aapt, Inspector};
use crate::classify::classify;
use crate::error::MergeError;
use crate::io::container::Container;
use crate::io::extract::extract_zip;
use crate::io::workdir::WorkArea;
use crate::members::MemberSet;
use crate::merge::{Conflict, DexAssignment, MergePlan};
use crate::paths::class_index;
use crate::repackage::{RepackageOptions, repackage};
use crate::reporter::Reporter;
use crate::signing::{ApkSigner, Keystore, Signer, SigningOutcome, finalize};
use crate::toolchain::ToolchainLocation;
use crate::validate::{check_container, validate};
use crate::xmltree::parse_manifest_tree;

/// One merge invocation.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Container archive or directory of members.
    pub input: PathBuf,
    /// Where the final artifact goes.
    pub output: PathBuf,
    pub keystore: Option<Keystore>,
    /// Concurrent classification tasks.
    pub jobs: usize,
    pub strip_signatures: bool,
    /// Parent of the temporary work area; the system temp dir when `None`.
    pub work_dir: Option<PathBuf>,
}

impl MergeRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            keystore: None,
            jobs: num_cpus::get(),
            strip_signatures: false,
            work_dir: None,
        }
    }
}

/// Everything known after a successful merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    /// Members in canonical order.
    pub members: Vec<PackageMember>,
    pub conflicts: Vec<Conflict>,
    pub dex: Vec<DexAssignment>,
    /// Entries written to the archive.
    pub entries: usize,
    pub output: PathBuf,
    /// SHA-256 of the output artifact, hex encoded.
    pub sha256: String,
    pub signing: SigningOutcome,
    /// Decoded base manifest, when the toolchain could provide it.
    pub manifest: Option<ManifestDescriptor>,
    pub warnings: Vec<String>,
}

/// Result of `inspect`: classification and validation, no merge.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub members: Vec<PackageMember>,
    pub container: Option<ContainerManifest>,
    /// Why a merge would be refused, if it would.
    pub problem: Option<String>,
    pub manifest: Option<ManifestDescriptor>,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct Pipeline {
    inspector: Arc<dyn Inspector>,
    signer: Arc<dyn Signer>,
    reporter: Arc<dyn Reporter>,
}

impl Pipeline {
    pub fn new(
        inspector: Arc<dyn Inspector>,
        signer: Arc<dyn Signer>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            inspector,
            signer,
            reporter,
        }
    }

    /// Pipeline backed by the real Android build-tools.
    pub fn with_toolchain(toolchain: Arc<ToolchainLocation>, reporter: Arc<dyn Reporter>) -> Self {
        Self::new(
            Arc::new(Aapt::new(toolchain.clone())),
            Arc::new(ApkSigner::new(toolchain)),
            reporter,
        )
    }

    /// Merge the members of `request.input` into one package.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] if the input is not a usable container, the
    /// members disagree on identity, or any filesystem step fails. Signing
    /// problems are not errors; see [`SigningOutcome`].
    pub async fn run(&self, request: MergeRequest) -> Result<MergeSummary, MergeError> {
        let work = WorkArea::new(request.work_dir.as_deref())
            .map_err(|e| MergeError::io("Failed to create work area", e))?;

        self.reporter.section("Opening");
        let container = self.open(&request.input, work.container_dir()).await?;
        let mut warnings = container.warnings.clone();

        self.reporter.section("Classifying");
        let members = self.classify_all(container.members.clone(), request.jobs).await?;
        for member in &members {
            self.reporter.classified(member);
            warnings.extend(member.warnings.iter().cloned());
        }

        self.reporter.section("Validating");
        let set = MemberSet::new(members)?;
        warnings.extend(set.warnings().iter().cloned());
        validate(&set, self.reporter.as_ref())?;
        if let Some(manifest) = &container.manifest {
            for warning in check_container(&set, manifest) {
                self.reporter.warning(&warning);
                warnings.push(warning);
            }
        }

        let stage = MergeStage {
            inspector: self.inspector.clone(),
            signer: self.signer.clone(),
            reporter: self.reporter.clone(),
        };
        let mut summary =
            tokio::task::spawn_blocking(move || stage.run(set, work, &request)).await??;
        warnings.append(&mut summary.warnings);
        summary.warnings = warnings;
        Ok(summary)
    }

    /// Classify and validate without merging.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] only if the input cannot be opened; identity
    /// problems are reported in [`Inspection::problem`].
    pub async fn inspect(
        &self,
        input: &Path,
        jobs: usize,
        work_dir: Option<&Path>,
    ) -> Result<Inspection, MergeError> {
        let work =
            WorkArea::new(work_dir).map_err(|e| MergeError::io("Failed to create work area", e))?;

        self.reporter.section("Opening");
        let container = self.open(input, work.container_dir()).await?;
        let mut warnings = container.warnings.clone();

        self.reporter.section("Classifying");
        let members = self.classify_all(container.members.clone(), jobs).await?;
        for member in &members {
            self.reporter.classified(member);
            warnings.extend(member.warnings.iter().cloned());
        }

        let (members, problem, manifest) = match MemberSet::new(members.clone()) {
            Ok(set) => {
                warnings.extend(set.warnings().iter().cloned());
                let problem = validate(&set, self.reporter.as_ref())
                    .err()
                    .map(|e| e.to_string());
                if let Some(descriptor) = &container.manifest {
                    warnings.extend(check_container(&set, descriptor));
                }
                let manifest = set.base().and_then(|base| self.describe(&base.path));
                (set.into_members(), problem, manifest)
            }
            Err(e) => (members, Some(e.to_string()), None),
        };

        Ok(Inspection {
            members,
            container: container.manifest,
            problem,
            manifest,
            warnings,
        })
    }

    async fn open(&self, input: &Path, scratch: PathBuf) -> Result<Container, MergeError> {
        let input = input.to_path_buf();
        tokio::task::spawn_blocking(move || Container::open(&input, &scratch)).await?
    }

    /// Classify every member on a bounded pool, returning them in input order.
    async fn classify_all(
        &self,
        paths: Vec<PathBuf>,
        jobs: usize,
    ) -> Result<Vec<PackageMember>, MergeError> {
        let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
        let mut set: JoinSet<Result<(usize, PackageMember), tokio::task::JoinError>> =
            JoinSet::new();

        for (index, path) in paths.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let inspector = self.inspector.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                tokio::task::spawn_blocking(move || {
                    tracing::debug!("Classifying {}", path.display());
                    (index, classify(&path, inspector.as_ref()))
                })
                .await
            });
        }

        let mut classified = Vec::new();
        while let Some(res) = set.join_next().await {
            classified.push(res??);
        }
        classified.sort_by_key(|(index, _)| *index);
        Ok(classified.into_iter().map(|(_, member)| member).collect())
    }

    fn describe(&self, apk: &Path) -> Option<ManifestDescriptor> {
        describe_manifest(self.inspector.as_ref(), apk)
    }
}

fn describe_manifest(inspector: &dyn Inspector, apk: &Path) -> Option<ManifestDescriptor> {
    match inspector.xmltree(apk, ANDROID_MANIFEST) {
        Ok(text) => Some(parse_manifest_tree(&text)),
        Err(e) => {
            tracing::debug!("No manifest tree for {}: {e}", apk.display());
            None
        }
    }
}

/// The blocking tail of a run: everything after validation.
struct MergeStage {
    inspector: Arc<dyn Inspector>,
    signer: Arc<dyn Signer>,
    reporter: Arc<dyn Reporter>,
}

impl MergeStage {
    fn run(
        &self,
        set: MemberSet,
        work: WorkArea,
        request: &MergeRequest,
    ) -> Result<MergeSummary, MergeError> {
        let reporter = self.reporter.as_ref();
        let mut warnings = Vec::new();

        reporter.section("Extracting");
        let mut roots = Vec::with_capacity(set.len());
        for (index, member) in set.iter().enumerate() {
            let dir = work.member_dir(index, member.stem());
            extract_zip(&member.path, &dir)?;
            check_member_tree(member, &dir)?;
            roots.push(dir);
        }

        let manifest = set
            .base()
            .and_then(|base| describe_manifest(self.inspector.as_ref(), &base.path));

        reporter.section("Merging");
        let report = MergePlan::build(&set, &roots, &work.merged_dir())?.apply(reporter)?;

        reporter.section("Packaging");
        let packaged = repackage(
            &report.root,
            &work.unsigned_path(),
            RepackageOptions {
                strip_signatures: request.strip_signatures,
            },
        )?;
        if let Some(problem) = packaged.structural_problem() {
            return Err(MergeError::MalformedOutput(problem));
        }

        reporter.section("Signing");
        let signing = finalize(
            self.signer.as_ref(),
            &packaged.path,
            &request.output,
            request.keystore.as_ref(),
            reporter,
        )
        .map_err(|e| MergeError::io(format!("Failed to write {}", request.output.display()), e))?;
        if let SigningOutcome::UnsignedFallback { reason, .. } = &signing {
            let msg = format!("Output is unsigned ({reason}); sign it before installing");
            reporter.warning(&msg);
            warnings.push(msg);
        }

        let sha256 = sha256_file(signing.path())
            .map_err(|e| MergeError::io(format!("Failed to hash {}", signing.path().display()), e))?;

        if let Err(e) = work.close() {
            let msg = format!("Failed to remove work area: {e}");
            reporter.warning(&msg);
            warnings.push(msg);
        }

        Ok(MergeSummary {
            members: set.into_members(),
            conflicts: report.conflicts,
            dex: report.dex,
            entries: packaged.entries.len(),
            output: signing.path().to_path_buf(),
            sha256,
            signing,
            manifest,
            warnings,
        })
    }
}

/// Every member needs a manifest; the base also needs code.
fn check_member_tree(member: &PackageMember, root: &Path) -> Result<(), MergeError> {
    let malformed = |reason: &str| MergeError::MalformedMember {
        member: member.file_name.clone(),
        reason: reason.to_string(),
    };
    if !root.join(ANDROID_MANIFEST).is_file() {
        return Err(malformed("no AndroidManifest.xml"));
    }
    if member.is_base() {
        let has_dex = std::fs::read_dir(root)
            .map_err(|e| MergeError::io(format!("Failed to read {}", root.display()), e))?
            .filter_map(Result::ok)
            .any(|e| {
                e.path().is_file() && class_index(&e.file_name().to_string_lossy()).is_some()
            });
        if !has_dex {
            return Err(malformed("base member carries no classes*.dex"));
        }
    }
    Ok(())
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
