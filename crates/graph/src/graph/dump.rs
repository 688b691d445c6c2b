//! Graphviz rendering of a compiled frame, for offline inspection of the dependency
//! structure and the emitted transitions.

use std::fmt::Write;

use crate::{
	graph::{ExecutionInfo, Framegraph, FxHashMap, FxHashSet, TaskHandle, TransientTexture},
	resource::TextureStatus,
	sync::AccessType,
};

fn task_id(handle: TaskHandle) -> String { format!("task_{}_{}", handle.0.index(), handle.0.generation()) }

fn resource_id(handle: TransientTexture) -> String {
	format!(
		"res_{}_{}_v{}",
		handle.texture().index(),
		handle.texture().generation(),
		handle.version()
	)
}

fn escape(name: &str) -> String { name.replace('\\', "\\\\").replace('"', "\\\"") }

/// Produces a deterministic DOT graph: tasks as boxes, resource versions as ellipses,
/// edges labeled with the access (and the recorded transition, when one was logged).
pub(crate) fn generate_dot(graph: &Framegraph, info: &ExecutionInfo) -> String {
	let mut out = String::new();
	let _ = writeln!(out, "digraph framegraph {{");
	let _ = writeln!(out, "\trankdir = \"LR\";");
	let _ = writeln!(out, "\tnode [fontname = \"monospace\"];");

	let required: FxHashSet<_> = info.resources.iter().copied().collect();
	let mut transitions: FxHashMap<(TaskHandle, TransientTexture), (AccessType, AccessType)> = FxHashMap::default();
	for transition in &info.transitions {
		transitions.insert(
			(transition.task, transition.resource),
			(transition.state_before, transition.state_after),
		);
	}

	// Collect resource nodes in a stable order: task declaration order, then imports and
	// outputs that no task mentions.
	let mut resources = Vec::new();
	let mut seen = FxHashSet::default();
	for (_, task) in graph.tasks() {
		for dep in &task.dependencies {
			if seen.insert(dep.handle) {
				resources.push(dep.handle);
			}
		}
	}
	for &handle in graph.external_inputs().iter().chain(graph.outputs()) {
		if seen.insert(handle) {
			resources.push(handle);
		}
	}

	for handle in resources {
		let (name, fillcolor) = match (graph.resources().info(handle), graph.resources().state(handle)) {
			(Ok(info), Ok(state)) => (
				info.name.clone(),
				match state.status {
					TextureStatus::External => "skyblue",
					TextureStatus::Allocated => "palegreen",
					TextureStatus::Virtual if required.contains(&handle) => "khaki",
					TextureStatus::Virtual => "lightgray",
				},
			),
			_ => ("<stale>".into(), "tomato"),
		};
		let peripheries = if graph.outputs().contains(&handle) { 2 } else { 1 };
		let _ = writeln!(
			out,
			"\t\"{}\" [label = \"{} v{}\", shape = \"ellipse\", style = \"filled\", fillcolor = \"{}\", peripheries = {}];",
			resource_id(handle),
			escape(&name),
			handle.version(),
			fillcolor,
			peripheries
		);
	}

	for (handle, task) in graph.tasks() {
		let alive = task.execution_priority >= 0;
		let label = if alive {
			format!("{}\\nprio {}", escape(&task.name), task.execution_priority)
		} else {
			format!("{}\\ndropped", escape(&task.name))
		};
		let _ = writeln!(
			out,
			"\t\"{}\" [label = \"{}\", shape = \"box\", style = \"filled\", fillcolor = \"{}\"];",
			task_id(handle),
			label,
			if alive { "palegreen" } else { "lightgray" }
		);

		for dep in &task.dependencies {
			let mut label = format!("{} {:?}", dep.kind.label(), dep.access);
			if let Some(&(before, after)) = transitions.get(&(handle, dep.handle)) {
				let _ = write!(label, "\\n{:?} -> {:?}", before, after);
			}
			if dep.kind.is_read() && !dep.kind.produces_version() {
				let _ = writeln!(
					out,
					"\t\"{}\" -> \"{}\" [label = \"{}\"];",
					resource_id(dep.handle),
					task_id(handle),
					label
				);
			} else {
				let _ = writeln!(
					out,
					"\t\"{}\" -> \"{}\" [label = \"{}\"];",
					task_id(handle),
					resource_id(dep.handle),
					label
				);
			}
		}
	}

	let _ = writeln!(out, "}}");
	out
}
