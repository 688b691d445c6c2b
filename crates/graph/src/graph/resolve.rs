//! Output-driven reachability analysis over the task registry.

use std::collections::VecDeque;

use tracing::trace;

use crate::{
	graph::{
		task::{DependencyKind, TaskInfo, TaskState},
		texture::TextureManager,
		ExecutionInfo, FxHashMap, FxHashSet, TaskHandle, TransientTexture,
	},
	slotmap::SlotMap,
	Error, Result,
};

/// Flood-fills the dependency graph backwards from the requested outputs, assigning every
/// reached task an execution priority. Higher priority means earlier execution; tasks left
/// at -1 are dead and dropped from the plan.
pub(crate) fn resolve(
	tasks: &mut SlotMap<TaskInfo>, textures: &TextureManager, external_inputs: &[TransientTexture],
	requested: &[TransientTexture],
) -> Result<ExecutionInfo> {
	let mut execution_priority = -1i32;

	// Reorder the declarations into in- and out-edges: which task produces each resource
	// version, and which versions each task consumes.
	let mut producer = FxHashMap::default();
	let mut task_inputs: FxHashMap<TaskHandle, Vec<TransientTexture>> = FxHashMap::default();
	for (handle, info) in tasks.iter() {
		let handle = TaskHandle(handle);
		for dep in &info.dependencies {
			if dep.kind.produces_version() {
				let previous = producer.insert(dep.handle, handle);
				debug_assert!(previous.is_none(), "two producers for one resource version");
			}
			match dep.kind {
				DependencyKind::Read => task_inputs.entry(handle).or_default().push(dep.handle),
				// A read-modify-write consumes the version below the one it mints.
				DependencyKind::ReadWrite => task_inputs
					.entry(handle)
					.or_default()
					.push(dep.handle.previous_version()),
				DependencyKind::Create | DependencyKind::Write => {},
			}
		}
	}

	let mut required = Vec::new();
	let mut seen = FxHashSet::default();
	let mut pending: VecDeque<TransientTexture> = requested.iter().copied().collect();

	while let Some(resource) = pending.pop_front() {
		if seen.insert(resource) {
			required.push(resource);
		}

		let Some(&task) = producer.get(&resource) else {
			if external_inputs.contains(&resource) {
				continue;
			}
			let name = textures.info(resource).map(|info| info.name.clone()).unwrap_or_default();
			return Err(Error::UnresolvedDependency(format!(
				"resource '{} v{}' is not produced by any task and is not an external input",
				name,
				resource.version()
			)));
		};

		// Re-visits intentionally bump the priority again: a producer reached through
		// several consumers must run before all of them.
		execution_priority += 1;
		let info = tasks.get_mut(task.0).ok_or(Error::StaleHandle)?;
		info.execution_priority = execution_priority;
		trace!(
			"resolved '{} v{}', produced by task '{}' (priority {})",
			textures.info(resource).map(|info| info.name.as_str()).unwrap_or(""),
			resource.version(),
			info.name,
			execution_priority
		);

		for dep in info.dependencies.iter().filter(|dep| dep.kind == DependencyKind::Create) {
			if seen.insert(dep.handle) {
				required.push(dep.handle);
			}
		}

		if let Some(inputs) = task_inputs.get(&task) {
			pending.extend(inputs.iter().copied());
		}
	}

	let mut scheduled: Vec<(TaskHandle, i32)> = Vec::new();
	for (handle, info) in tasks.iter_mut() {
		if info.execution_priority >= 0 {
			info.state = TaskState::Compiled;
			scheduled.push((TaskHandle(handle), info.execution_priority));
		} else {
			info.state = TaskState::Dropped;
		}
	}
	// Highest priority first; priorities are unique, so this is a total order.
	scheduled.sort_by_key(|&(_, priority)| -priority);

	trace!("task order after resolve:");
	for &(handle, priority) in &scheduled {
		trace!("  [{}] {}", priority, tasks.get(handle.0).map(|t| t.name.as_str()).unwrap_or(""));
	}

	Ok(ExecutionInfo {
		tasks: scheduled.into_iter().map(|(handle, _)| handle).collect(),
		resources: required,
		transitions: Vec::new(),
	})
}
