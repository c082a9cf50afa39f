//! Manifest-driven commands.
//!
//! Entries are reconciled concurrently, each under an [`IdLocks`] guard for
//! its object. A failing entry does not stop the others: successes are
//! recorded in the state file and the command fails at the end.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use futures_util::future::join_all;
use nsxt_reconciler::resources::{
    DhcpRelayProfile, DhcpRelayProfileObject, NsGroup, NsGroupObject, NsGroupSpec,
    SpoofGuardSwitchingProfile, SpoofGuardSwitchingProfileObject,
};
use nsxt_reconciler::{
    IdLocks, ManagedResource, NsxClient, Outcome, Plan, Reconciler, Refresh, RemoteApi, Resource,
    ResourceState,
};
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

use crate::manifest::{DataEntry, DataSource, Manifest, ResourceEntry, ResourceSpec};
use crate::state::{EntryState, StateFile, StateKind};

/// One remote accessor per object type.
#[derive(Clone)]
pub struct Remotes {
    pub dhcp_relay_profiles: Arc<dyn RemoteApi<DhcpRelayProfileObject>>,
    pub spoofguard_profiles: Arc<dyn RemoteApi<SpoofGuardSwitchingProfileObject>>,
    pub ns_groups: Arc<dyn RemoteApi<NsGroupObject>>,
}

impl Remotes {
    /// All object types served by one NSX manager.
    pub fn nsx(client: NsxClient) -> Self {
        Self {
            dhcp_relay_profiles: Arc::new(client.clone()),
            spoofguard_profiles: Arc::new(client.clone()),
            ns_groups: Arc::new(client),
        }
    }
}

/// Selects the accessor for a kind.
pub trait Kind: StateKind {
    fn remote(remotes: &Remotes) -> Arc<dyn RemoteApi<Self::Object>>;
}

impl Kind for DhcpRelayProfile {
    fn remote(remotes: &Remotes) -> Arc<dyn RemoteApi<Self::Object>> {
        Arc::clone(&remotes.dhcp_relay_profiles)
    }
}

impl Kind for SpoofGuardSwitchingProfile {
    fn remote(remotes: &Remotes) -> Arc<dyn RemoteApi<Self::Object>> {
        Arc::clone(&remotes.spoofguard_profiles)
    }
}

impl Kind for NsGroup {
    fn remote(remotes: &Remotes) -> Arc<dyn RemoteApi<Self::Object>> {
        Arc::clone(&remotes.ns_groups)
    }
}

type KindReconciler<R> = Reconciler<R, Arc<dyn RemoteApi<<R as Resource>::Object>>>;

pub struct Session {
    remotes: Remotes,
    locks: IdLocks,
}

impl Session {
    pub fn new(remotes: Remotes) -> Self {
        Self {
            remotes,
            locks: IdLocks::new(),
        }
    }

    fn reconciler<R: Kind>(&self) -> KindReconciler<R> {
        Reconciler::new(R::remote(&self.remotes))
    }

    /// Serialize work on one object. Entries without an id lock their name.
    async fn lock<R: Kind>(
        &self,
        name: &str,
        state: &ResourceState<R::Spec>,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let key = format!("{}/{}", R::KIND, state.id().unwrap_or(name));
        self.locks.lock(&key).await
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ENTRY")]
    entry: String,
    #[tabled(rename = "KIND")]
    kind: &'static str,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

impl Row {
    fn new(entry: &str, kind: &'static str, id: Option<&str>, result: impl ToString) -> Self {
        Self {
            entry: entry.to_string(),
            kind,
            id: id.unwrap_or("-").to_string(),
            result: result.to_string(),
        }
    }
}

fn print_rows(rows: Vec<Row>) {
    if rows.is_empty() {
        println!("Nothing to do");
    } else {
        println!("{}", Table::new(rows));
    }
}

/// Recorded state for an entry with the manifest's desired fields.
fn prior<R: StateKind>(
    name: &str,
    desired: R::Spec,
    previous: Option<EntryState>,
) -> Result<ResourceState<R::Spec>> {
    match previous.map(R::from_entry) {
        None => Ok(ResourceState::new(desired)),
        Some(Ok(recorded)) => Ok(ResourceState { desired, ..recorded }),
        Some(Err(other)) => bail!(
            "Entry '{}' is recorded as {}, destroy it before declaring it as {}",
            name,
            other.kind(),
            R::KIND
        ),
    }
}

/// Names recorded in state but no longer declared.
fn orphans(manifest: &Manifest, state: &StateFile) -> Vec<(String, EntryState)> {
    state
        .entries
        .iter()
        .filter(|(name, _)| !manifest.contains(name))
        .map(|(name, entry)| (name.clone(), entry.state.clone()))
        .collect()
}

/// Run per-entry futures concurrently and log each failure.
async fn run_all<T, F>(jobs: Vec<(String, F)>) -> (Vec<(String, T)>, usize)
where
    F: Future<Output = Result<T>>,
{
    let (names, futures): (Vec<_>, Vec<_>) = jobs.into_iter().unzip();
    let results = join_all(futures).await;

    let mut done = Vec::new();
    let mut failed = 0;
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(value) => done.push((name, value)),
            Err(e) => {
                error!("{:#}", e);
                failed += 1;
            }
        }
    }
    (done, failed)
}

fn finish(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        bail!("{} of {} entries failed", failed, total);
    }
    Ok(())
}

// === plan ===

pub async fn plan(session: &Session, manifest: &Manifest, state: &StateFile) -> Result<()> {
    let jobs: Vec<_> = manifest
        .resources
        .iter()
        .map(|entry| {
            let previous = state.get(&entry.name).cloned();
            (entry.name.clone(), plan_entry(session, entry, previous))
        })
        .collect();
    let total = jobs.len();
    let (planned, failed) = run_all(jobs).await;

    let mut rows: Vec<Row> = planned
        .into_iter()
        .map(|(name, (kind, id, plan))| Row::new(&name, kind, id.as_deref(), plan))
        .collect();
    for entry in &manifest.data {
        rows.push(Row::new(&entry.name, entry.source.kind(), None, "read"));
    }
    for (name, entry) in orphans(manifest, state) {
        let action = if entry.is_data() { "forget" } else { "destroy" };
        rows.push(Row::new(&name, entry.kind(), entry.id(), action));
    }
    print_rows(rows);
    finish(failed, total)
}

async fn plan_entry(
    session: &Session,
    entry: &ResourceEntry,
    previous: Option<EntryState>,
) -> Result<(&'static str, Option<String>, Plan)> {
    let kind = entry.spec.kind();
    let (id, plan) = match entry.spec.clone() {
        ResourceSpec::DhcpRelayProfile(spec) => {
            plan_kind::<DhcpRelayProfile>(session, &entry.name, spec, previous).await?
        }
        ResourceSpec::SpoofguardSwitchingProfile(spec) => {
            plan_kind::<SpoofGuardSwitchingProfile>(session, &entry.name, spec, previous).await?
        }
    };
    Ok((kind, id, plan))
}

async fn plan_kind<R: Kind + ManagedResource>(
    session: &Session,
    name: &str,
    desired: R::Spec,
    previous: Option<EntryState>,
) -> Result<(Option<String>, Plan)> {
    let state = prior::<R>(name, desired, previous)?;
    let plan = session
        .reconciler::<R>()
        .plan(&state)
        .await
        .with_context(|| format!("Failed to plan '{}'", name))?;
    Ok((state.id().map(str::to_string), plan))
}

// === apply ===

pub async fn apply(session: &Session, manifest: &Manifest, state: &mut StateFile) -> Result<()> {
    let mut rows = Vec::new();
    let mut failed = 0;
    let mut total = 0;

    // Data sources
    let jobs: Vec<_> = manifest
        .data
        .iter()
        .map(|entry| (entry.name.clone(), read_data(session, entry)))
        .collect();
    total += jobs.len();
    let (read, data_failed) = run_all(jobs).await;
    failed += data_failed;
    for (name, entry) in read {
        rows.push(Row::new(&name, entry.kind(), entry.id(), "read"));
        state.insert(name, entry);
    }

    // Managed resources
    let jobs: Vec<_> = manifest
        .resources
        .iter()
        .map(|entry| {
            let previous = state.get(&entry.name).cloned();
            (entry.name.clone(), apply_entry(session, entry, previous))
        })
        .collect();
    total += jobs.len();
    let (applied, apply_failed) = run_all(jobs).await;
    failed += apply_failed;
    for (name, (entry, outcome)) in applied {
        if outcome != Outcome::Unchanged {
            info!("{} '{}' {}", entry.kind(), name, outcome);
        }
        rows.push(Row::new(&name, entry.kind(), entry.id(), &outcome));
        state.insert(name, entry);
    }

    // Entries dropped from the manifest
    let jobs: Vec<_> = orphans(manifest, state)
        .into_iter()
        .map(|(name, entry)| {
            let row_kind = entry.kind();
            let row_id = entry.id().map(str::to_string);
            let job_name = name.clone();
            (name, async move {
                destroy_entry(session, &job_name, entry).await?;
                Ok::<_, anyhow::Error>((row_kind, row_id))
            })
        })
        .collect();
    total += jobs.len();
    let (destroyed, destroy_failed) = run_all(jobs).await;
    failed += destroy_failed;
    for (name, (kind, id)) in destroyed {
        rows.push(Row::new(&name, kind, id.as_deref(), "destroyed"));
        state.remove(&name);
    }

    print_rows(rows);
    finish(failed, total)
}

async fn read_data(session: &Session, entry: &DataEntry) -> Result<EntryState> {
    match &entry.source {
        DataSource::NsGroup { id, display_name } => {
            let spec = NsGroupSpec {
                display_name: display_name.clone(),
                description: None,
            };
            let mut state = ResourceState::new(spec);
            if let Some(id) = id {
                state = state.with_id(id.clone());
            }
            session
                .reconciler::<NsGroup>()
                .lookup(&mut state)
                .await
                .with_context(|| format!("Failed to read '{}'", entry.name))?;
            Ok(NsGroup::into_entry(state))
        }
    }
}

async fn apply_entry(
    session: &Session,
    entry: &ResourceEntry,
    previous: Option<EntryState>,
) -> Result<(EntryState, Outcome)> {
    match entry.spec.clone() {
        ResourceSpec::DhcpRelayProfile(spec) => {
            converge::<DhcpRelayProfile>(session, &entry.name, spec, previous).await
        }
        ResourceSpec::SpoofguardSwitchingProfile(spec) => {
            converge::<SpoofGuardSwitchingProfile>(session, &entry.name, spec, previous).await
        }
    }
}

async fn converge<R: Kind + ManagedResource>(
    session: &Session,
    name: &str,
    desired: R::Spec,
    previous: Option<EntryState>,
) -> Result<(EntryState, Outcome)> {
    let mut state = prior::<R>(name, desired, previous)?;
    let _guard = session.lock::<R>(name, &state).await;
    let outcome = session
        .reconciler::<R>()
        .reconcile(&mut state)
        .await
        .with_context(|| format!("Failed to apply '{}'", name))?;
    Ok((R::into_entry(state), outcome))
}

// === refresh ===

pub async fn refresh(session: &Session, state: &mut StateFile) -> Result<()> {
    let jobs: Vec<_> = state
        .entries
        .iter()
        .map(|(name, entry)| {
            let job_name = name.clone();
            let entry = entry.state.clone();
            (name.clone(), async move {
                refresh_entry(session, &job_name, entry).await
            })
        })
        .collect();
    let total = jobs.len();
    let (refreshed, failed) = run_all(jobs).await;

    let mut rows = Vec::new();
    for (name, entry) in refreshed {
        match entry {
            Some(entry) => {
                rows.push(Row::new(&name, entry.kind(), entry.id(), "present"));
                state.insert(name, entry);
            }
            None => {
                if let Some(gone) = state.remove(&name) {
                    rows.push(Row::new(&name, gone.kind(), gone.id(), "deleted"));
                }
            }
        }
    }
    print_rows(rows);
    finish(failed, total)
}

async fn refresh_entry(
    session: &Session,
    name: &str,
    entry: EntryState,
) -> Result<Option<EntryState>> {
    match entry {
        EntryState::DhcpRelayProfile(s) => refresh_kind::<DhcpRelayProfile>(session, name, s).await,
        EntryState::SpoofguardSwitchingProfile(s) => {
            refresh_kind::<SpoofGuardSwitchingProfile>(session, name, s).await
        }
        EntryState::NsGroup(s) => refresh_kind::<NsGroup>(session, name, s).await,
    }
}

/// `None` when the object is gone and the entry should be dropped.
async fn refresh_kind<R: Kind>(
    session: &Session,
    name: &str,
    mut state: ResourceState<R::Spec>,
) -> Result<Option<EntryState>> {
    if state.id().is_none() {
        return Ok(Some(R::into_entry(state)));
    }
    let _guard = session.lock::<R>(name, &state).await;
    let refreshed = session
        .reconciler::<R>()
        .refresh_state(&mut state)
        .await
        .with_context(|| format!("Failed to refresh '{}'", name))?;
    match refreshed {
        Refresh::Present(_) => Ok(Some(R::into_entry(state))),
        Refresh::Deleted => {
            warn!("{} '{}' no longer exists, dropping it from state", R::KIND, name);
            Ok(None)
        }
    }
}

// === destroy ===

pub async fn destroy(session: &Session, state: &mut StateFile, only: Option<&str>) -> Result<()> {
    if let Some(name) = only {
        if state.get(name).is_none() {
            bail!("No entry named '{}' in state", name);
        }
    }

    let jobs: Vec<_> = state
        .entries
        .iter()
        .filter(|(name, _)| only.is_none_or(|only| only == name.as_str()))
        .map(|(name, entry)| {
            let job_name = name.clone();
            let entry = entry.state.clone();
            (name.clone(), async move {
                let kind = entry.kind();
                let id = entry.id().map(str::to_string);
                destroy_entry(session, &job_name, entry).await?;
                Ok::<_, anyhow::Error>((kind, id))
            })
        })
        .collect();
    let total = jobs.len();
    let (destroyed, failed) = run_all(jobs).await;

    let mut rows = Vec::new();
    for (name, (kind, id)) in destroyed {
        rows.push(Row::new(&name, kind, id.as_deref(), "destroyed"));
        state.remove(&name);
    }
    print_rows(rows);
    finish(failed, total)
}

/// Delete a managed entry's object. Data entries are only forgotten.
async fn destroy_entry(session: &Session, name: &str, entry: EntryState) -> Result<()> {
    match entry {
        EntryState::DhcpRelayProfile(s) => finalize::<DhcpRelayProfile>(session, name, s).await,
        EntryState::SpoofguardSwitchingProfile(s) => {
            finalize::<SpoofGuardSwitchingProfile>(session, name, s).await
        }
        EntryState::NsGroup(_) => Ok(()),
    }
}

async fn finalize<R: Kind + ManagedResource>(
    session: &Session,
    name: &str,
    mut state: ResourceState<R::Spec>,
) -> Result<()> {
    let _guard = session.lock::<R>(name, &state).await;
    session
        .reconciler::<R>()
        .finalize(&mut state)
        .await
        .with_context(|| format!("Failed to destroy '{}'", name))
}

// === import ===

/// Adopt an existing object as the manifest entry `name`.
pub async fn import(
    session: &Session,
    manifest: &Manifest,
    state: &mut StateFile,
    name: &str,
    id: &str,
) -> Result<()> {
    let Some(entry) = manifest.resources.iter().find(|r| r.name == name) else {
        if manifest.data.iter().any(|d| d.name == name) {
            bail!("'{}' is a data source and is read on apply, not imported", name);
        }
        bail!("No resource named '{}' in manifest", name);
    };
    if let Some(recorded) = state.get(name).and_then(EntryState::id) {
        bail!(
            "Entry '{}' already manages {} {}, destroy it before importing",
            name,
            entry.spec.kind(),
            recorded
        );
    }

    let imported = match entry.spec.clone() {
        ResourceSpec::DhcpRelayProfile(spec) => {
            import_kind::<DhcpRelayProfile>(session, name, spec, id).await?
        }
        ResourceSpec::SpoofguardSwitchingProfile(spec) => {
            import_kind::<SpoofGuardSwitchingProfile>(session, name, spec, id).await?
        }
    };
    info!("Imported {} {} as '{}'", imported.kind(), id, name);
    print_rows(vec![Row::new(name, imported.kind(), Some(id), "imported")]);
    state.insert(name, imported);
    Ok(())
}

async fn import_kind<R: Kind + ManagedResource>(
    session: &Session,
    name: &str,
    desired: R::Spec,
    id: &str,
) -> Result<EntryState> {
    let mut state = ResourceState::new(desired).with_id(id);
    let _guard = session.lock::<R>(name, &state).await;
    let refreshed = session
        .reconciler::<R>()
        .refresh_state(&mut state)
        .await
        .with_context(|| format!("Failed to import '{}'", name))?;
    match refreshed {
        Refresh::Present(_) => Ok(R::into_entry(state)),
        Refresh::Deleted => bail!("{} {} does not exist", R::KIND, id),
    }
}

// === lookup ===

pub async fn lookup_ns_group(session: &Session, id: Option<&str>, name: Option<&str>) -> Result<()> {
    let target = id.or(name).unwrap_or_default();
    let group = session
        .reconciler::<NsGroup>()
        .resolve(id, name)
        .await?
        .into_result(NsGroup::KIND, target)?;

    println!("ID:          {}", group.id);
    println!("Name:        {}", group.display_name);
    if !group.description.is_empty() {
        println!("Description: {}", group.description);
    }
    if let Some(revision) = group.revision {
        println!("Revision:    {}", revision);
    }
    Ok(())
}
