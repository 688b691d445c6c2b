use ash::vk;

use super::*;
use crate::{
	resource::{Backing, TextureStatus},
	sync::{self, AccessType},
};

fn tex(name: &str, width: u32, height: u32) -> TextureInfo {
	TextureInfo::new(
		name,
		vk::Extent3D {
			width,
			height,
			depth: 1,
		},
		vk::Format::R8G8B8A8_UNORM,
	)
}

fn external(graph: &mut Framegraph, name: &str) -> TransientTexture {
	graph.declare_input(tex(name, 800, 600), AccessType::Nothing, vk::Image::null(), vk::ImageView::null())
}

/// Stands in for `TextureManager::allocate` in tests that never touch a device.
fn attach_null_backing(graph: &mut Framegraph, handle: TransientTexture) {
	graph
		.textures
		.attach(handle, Backing::external(vk::Image::null(), vk::ImageView::null()))
		.unwrap();
}

fn names(graph: &Framegraph, info: &ExecutionInfo) -> Vec<String> {
	info.tasks
		.iter()
		.map(|&handle| graph.task(handle).unwrap().name.clone())
		.collect()
}

#[test]
fn single_writer_to_external_target() {
	let mut graph = Framegraph::new();
	let c0 = external(&mut graph, "backbuffer");

	let mut task = graph.declare_task("clear");
	let (c1, info) = task.write(c0, AccessType::ColorAttachmentWrite).unwrap();
	assert_eq!(info.name, "backbuffer");
	assert_eq!(c1.version(), 1);
	task.render_pass("clear")
		.color(
			c1,
			vk::AttachmentLoadOp::CLEAR,
			vk::AttachmentStoreOp::STORE,
			vk::ClearColorValue {
				float32: [0.0, 0.0, 0.0, 1.0],
			},
		)
		.finish();
	let task = task.finish(|_| Ok(())).unwrap();

	let (out_info, out_state) = graph.declare_output(c1).unwrap();
	assert_eq!(out_info.name, "backbuffer");
	assert_eq!(out_state.status, TextureStatus::External);

	let info = graph.resolve().unwrap();
	assert_eq!(info.tasks, vec![task]);
	assert_eq!(graph.task(task).unwrap().execution_priority, 0);

	let (barriers, transitions) = record::sync_task(&mut graph.textures, &graph.tasks, task).unwrap();
	assert_eq!(barriers.len(), 1);
	assert_eq!(barriers[0].previous_access, AccessType::Nothing);
	assert_eq!(barriers[0].next_access, AccessType::ColorAttachmentWrite);
	assert!(barriers[0].discard_contents);

	let (_, _, vk_barrier) = sync::get_image_memory_barrier(&barriers[0].as_sync()).unwrap();
	assert_eq!(vk_barrier.old_layout, vk::ImageLayout::UNDEFINED);
	assert_eq!(vk_barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

	assert_eq!(transitions.len(), 1);
	assert_eq!(transitions[0].kind, DependencyKind::Write);
	assert_eq!(transitions[0].state_before, AccessType::Nothing);
	assert_eq!(transitions[0].state_after, AccessType::ColorAttachmentWrite);
}

#[test]
fn offscreen_then_compose() {
	let mut graph = Framegraph::new();
	let swapchain = external(&mut graph, "swapchain");

	let mut offscreen = graph.declare_task("offscreen");
	let off = offscreen
		.create(tex("offscreen", 512, 512), AccessType::ColorAttachmentWrite)
		.unwrap();
	let offscreen = offscreen.finish(|_| Ok(())).unwrap();

	let mut compose = graph.declare_task("compose");
	let (off_read, _) = compose
		.read(off, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	assert_eq!(off_read, off);
	let (swap_out, _) = compose.write(swapchain, AccessType::ColorAttachmentWrite).unwrap();
	let compose = compose.finish(|_| Ok(())).unwrap();

	graph.declare_output(swap_out).unwrap();

	let info = graph.resolve().unwrap();
	assert_eq!(info.tasks, vec![offscreen, compose]);
	assert!(info.resources.contains(&off));
	assert!(info.resources.contains(&swap_out));

	assert_eq!(graph.textures.state(off).unwrap().status, TextureStatus::Virtual);
	attach_null_backing(&mut graph, off);
	assert_eq!(graph.textures.state(off).unwrap().status, TextureStatus::Allocated);

	let (barriers, _) = record::sync_task(&mut graph.textures, &graph.tasks, offscreen).unwrap();
	assert_eq!(barriers.len(), 1);
	assert_eq!(barriers[0].previous_access, AccessType::Nothing);
	assert_eq!(barriers[0].next_access, AccessType::ColorAttachmentWrite);
	assert!(barriers[0].discard_contents);

	let (barriers, _) = record::sync_task(&mut graph.textures, &graph.tasks, compose).unwrap();
	assert_eq!(barriers.len(), 2);
	assert_eq!(barriers[0].previous_access, AccessType::ColorAttachmentWrite);
	assert_eq!(
		barriers[0].next_access,
		AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer
	);
	assert!(!barriers[0].discard_contents);
	assert_eq!(barriers[1].previous_access, AccessType::Nothing);
	assert_eq!(barriers[1].next_access, AccessType::ColorAttachmentWrite);
	assert!(barriers[1].discard_contents);
	let (_, _, vk_barrier) = sync::get_image_memory_barrier(&barriers[1].as_sync()).unwrap();
	assert_eq!(vk_barrier.old_layout, vk::ImageLayout::UNDEFINED);
	assert_eq!(vk_barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
}

#[test]
fn unreachable_tasks_are_dropped() {
	let mut graph = Framegraph::new();

	let mut a = graph.declare_task("a");
	let x = a.create(tex("x", 256, 256), AccessType::ColorAttachmentWrite).unwrap();
	let a = a.finish(|_| Ok(())).unwrap();

	let mut b = graph.declare_task("b");
	let y = b.create(tex("y", 256, 256), AccessType::ColorAttachmentWrite).unwrap();
	let b = b.finish(|_| Ok(())).unwrap();

	let mut c = graph.declare_task("c");
	c.read(x, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let z = c.create(tex("z", 256, 256), AccessType::ColorAttachmentWrite).unwrap();
	let c = c.finish(|_| Ok(())).unwrap();

	graph.declare_output(z).unwrap();
	let info = graph.resolve().unwrap();

	assert_eq!(info.tasks, vec![a, c]);
	assert!(!info.resources.contains(&y));
	assert_eq!(graph.task(b).unwrap().execution_priority, -1);
	assert_eq!(graph.task(b).unwrap().state, TaskState::Dropped);
	assert_eq!(graph.task(a).unwrap().state, TaskState::Compiled);
}

#[test]
fn diamond_orders_producers_before_consumers() {
	let mut graph = Framegraph::new();

	let mut a = graph.declare_task("a");
	let x = a.create(tex("x", 128, 128), AccessType::ColorAttachmentWrite).unwrap();
	let a = a.finish(|_| Ok(())).unwrap();

	let mut b = graph.declare_task("b");
	b.read(x, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let y = b.create(tex("y", 128, 128), AccessType::ColorAttachmentWrite).unwrap();
	let b = b.finish(|_| Ok(())).unwrap();

	let mut c = graph.declare_task("c");
	c.read(x, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let z = c.create(tex("z", 128, 128), AccessType::ColorAttachmentWrite).unwrap();
	let c = c.finish(|_| Ok(())).unwrap();

	let mut d = graph.declare_task("d");
	d.read(y, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	d.read(z, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let o = d.create(tex("o", 128, 128), AccessType::ColorAttachmentWrite).unwrap();
	let d = d.finish(|_| Ok(())).unwrap();

	graph.declare_output(o).unwrap();
	let info = graph.resolve().unwrap();

	let position = |task| info.tasks.iter().position(|&t| t == task).unwrap();
	assert!(position(a) < position(b));
	assert!(position(a) < position(c));
	assert!(position(b) < position(d));
	assert!(position(c) < position(d));

	// Two readers, one allocation: x appears in the plan exactly once.
	assert_eq!(info.resources.iter().filter(|&&r| r == x).count(), 1);

	for &handle in &[x, y, z, o] {
		attach_null_backing(&mut graph, handle);
	}
	let mut sampled_reads = 0;
	for &task in &info.tasks {
		let (barriers, _) = record::sync_task(&mut graph.textures, &graph.tasks, task).unwrap();
		sampled_reads += barriers
			.iter()
			.filter(|b| {
				!b.discard_contents && b.next_access == AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer
			})
			.count();
	}
	// b and c both read x; d reads y and z.
	assert_eq!(sampled_reads, 4);
}

#[test]
fn read_write_chains_to_the_previous_producer() {
	let mut graph = Framegraph::new();
	let depth = external(&mut graph, "depth");

	let mut prepass = graph.declare_task("depth prepass");
	let (d1, _) = prepass.write(depth, AccessType::DepthStencilAttachmentWrite).unwrap();
	let prepass = prepass.finish(|_| Ok(())).unwrap();

	let mut main = graph.declare_task("main");
	let (d2, _) = main.read_write(d1, AccessType::DepthStencilAttachmentWrite).unwrap();
	let main = main.finish(|_| Ok(())).unwrap();

	graph.declare_output(d2).unwrap();
	let info = graph.resolve().unwrap();
	assert_eq!(info.tasks, vec![prepass, main]);

	// The read-modify-write must observe the prepass contents.
	record::sync_task(&mut graph.textures, &graph.tasks, prepass).unwrap();
	let (barriers, _) = record::sync_task(&mut graph.textures, &graph.tasks, main).unwrap();
	assert_eq!(barriers.len(), 1);
	assert!(!barriers[0].discard_contents);
	assert_eq!(barriers[0].previous_access, AccessType::DepthStencilAttachmentWrite);
}

#[test]
fn reads_bind_to_the_exact_version() {
	let mut graph = Framegraph::new();
	let x0 = external(&mut graph, "x");

	let mut a = graph.declare_task("a");
	a.write(x0, AccessType::ColorAttachmentWrite).unwrap();
	let a = a.finish(|_| Ok(())).unwrap();

	// Reading x at version 0 targets the imported contents, not a's output; a is dead.
	let mut b = graph.declare_task("b");
	b.read(x0, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let y = b.create(tex("y", 64, 64), AccessType::ColorAttachmentWrite).unwrap();
	let b = b.finish(|_| Ok(())).unwrap();

	graph.declare_output(y).unwrap();
	let info = graph.resolve().unwrap();
	assert_eq!(info.tasks, vec![b]);
	assert_eq!(graph.task(a).unwrap().state, TaskState::Dropped);
}

#[test]
fn chain_priorities_count_down_to_the_requested_output() {
	let mut graph = Framegraph::new();

	let mut t1 = graph.declare_task("t1");
	let r1 = t1.create(tex("r1", 32, 32), AccessType::ColorAttachmentWrite).unwrap();
	let t1 = t1.finish(|_| Ok(())).unwrap();

	let mut t2 = graph.declare_task("t2");
	t2.read(r1, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let r2 = t2.create(tex("r2", 32, 32), AccessType::ColorAttachmentWrite).unwrap();
	let t2 = t2.finish(|_| Ok(())).unwrap();

	let mut t3 = graph.declare_task("t3");
	t3.read(r2, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.unwrap();
	let r3 = t3.create(tex("r3", 32, 32), AccessType::ColorAttachmentWrite).unwrap();
	let t3 = t3.finish(|_| Ok(())).unwrap();

	graph.declare_output(r3).unwrap();
	let info = graph.resolve().unwrap();

	assert_eq!(info.tasks, vec![t1, t2, t3]);
	assert_eq!(graph.task(t1).unwrap().execution_priority, 2);
	assert_eq!(graph.task(t2).unwrap().execution_priority, 1);
	assert_eq!(graph.task(t3).unwrap().execution_priority, 0);
}

#[test]
fn no_outputs_compile_to_an_empty_plan() {
	let mut graph = Framegraph::new();
	let c0 = external(&mut graph, "backbuffer");
	let mut task = graph.declare_task("never runs");
	task.write(c0, AccessType::ColorAttachmentWrite).unwrap();
	task.finish(|_| Ok(())).unwrap();

	let info = graph.resolve().unwrap();
	assert!(info.tasks.is_empty());
	assert!(info.resources.is_empty());
	assert!(info.transitions.is_empty());
}

#[test]
fn missing_producer_is_reported() {
	let mut graph = Framegraph::new();
	let c0 = external(&mut graph, "backbuffer");
	let mut task = graph.declare_task("writer");
	let (c1, _) = task.write(c0, AccessType::ColorAttachmentWrite).unwrap();
	task.finish(|_| Ok(())).unwrap();

	// A version past everything any task produces.
	graph.outputs.push(c1.next_version());
	assert!(matches!(graph.resolve(), Err(Error::UnresolvedDependency(_))));
}

#[test]
fn declaration_contract_violations() {
	let mut graph = Framegraph::new();
	let c0 = external(&mut graph, "backbuffer");

	// Writes need write accesses, reads need read accesses.
	let mut task = graph.declare_task("t");
	assert!(task
		.write(c0, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
		.is_err());
	assert!(task.read(c0, AccessType::ColorAttachmentWrite).is_err());
	assert!(task.create(tex("v", 16, 16), AccessType::TransferRead).is_err());

	// A task cannot read the version it produces itself.
	let (c1, _) = task.write(c0, AccessType::ColorAttachmentWrite).unwrap();
	assert!(matches!(
		task.read(c1, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer),
		Err(Error::ContractViolation(_))
	));
	task.finish(|_| Ok(())).unwrap();

	// Only one task may produce a given version.
	let mut other = graph.declare_task("conflicting writer");
	assert!(matches!(
		other.write(c0, AccessType::ColorAttachmentWrite),
		Err(Error::ContractViolation(_))
	));
}

#[test]
fn unread_external_is_addressable_and_silent() {
	let mut graph = Framegraph::new();
	let unused = external(&mut graph, "unused input");
	let c0 = external(&mut graph, "backbuffer");

	let mut task = graph.declare_task("clear");
	let (c1, _) = task.write(c0, AccessType::ColorAttachmentWrite).unwrap();
	let task = task.finish(|_| Ok(())).unwrap();
	graph.declare_output(c1).unwrap();

	let info = graph.resolve().unwrap();
	assert_eq!(graph.resources().info(unused).unwrap().name, "unused input");
	assert!(!info.resources.contains(&unused));

	let (barriers, _) = record::sync_task(&mut graph.textures, &graph.tasks, task).unwrap();
	assert_eq!(barriers.len(), 1);
}

#[test]
fn synchronize_rejects_unallocated_virtual_textures() {
	let mut graph = Framegraph::new();
	let mut task = graph.declare_task("t");
	let v = task.create(tex("v", 64, 64), AccessType::ColorAttachmentWrite).unwrap();
	task.finish(|_| Ok(())).unwrap();

	assert!(matches!(
		graph
			.textures
			.synchronize(v, AccessType::ColorAttachmentWrite, ImageContents::Discard),
		Err(Error::ContractViolation(_))
	));
}

#[test]
fn handles_go_stale_after_reset() {
	let mut graph = Framegraph::new();
	let c0 = external(&mut graph, "backbuffer");
	graph.reset_unallocated();

	assert!(matches!(graph.resources().info(c0), Err(Error::StaleHandle)));
	assert_eq!(graph.resources().state(c0), Err(Error::StaleHandle));
	assert_eq!(graph.resources().len(), 0);

	let mut task = graph.declare_task("t");
	assert!(matches!(
		task.read(c0, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer),
		Err(Error::StaleHandle)
	));
}

#[test]
fn reset_and_replay_produces_the_same_frame() {
	fn run(graph: &mut Framegraph) -> (Vec<String>, Vec<Vec<ImageBarrier>>) {
		let swapchain = external(graph, "swapchain");

		let mut offscreen = graph.declare_task("offscreen");
		let off = offscreen
			.create(tex("offscreen", 512, 512), AccessType::ColorAttachmentWrite)
			.unwrap();
		offscreen.finish(|_| Ok(())).unwrap();

		let mut compose = graph.declare_task("compose");
		compose
			.read(off, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
			.unwrap();
		let (swap_out, _) = compose.write(swapchain, AccessType::ColorAttachmentWrite).unwrap();
		compose.finish(|_| Ok(())).unwrap();

		graph.declare_output(swap_out).unwrap();
		let info = graph.resolve().unwrap();
		attach_null_backing(graph, off);

		let barriers = info
			.tasks
			.iter()
			.map(|&task| record::sync_task(&mut graph.textures, &graph.tasks, task).unwrap().0)
			.collect();
		(names(graph, &info), barriers)
	}

	let mut graph = Framegraph::new();
	let first = run(&mut graph);

	graph.reset_unallocated();
	assert_eq!(graph.resources().len(), 0);
	assert_eq!(graph.tasks().count(), 0);
	assert!(graph.outputs().is_empty() && graph.external_inputs().is_empty());
	// Reset is idempotent.
	graph.reset_unallocated();

	let second = run(&mut graph);
	assert_eq!(first, second);
}

#[test]
fn dump_is_deterministic_and_annotated() {
	fn build() -> (Framegraph, ExecutionInfo) {
		let mut graph = Framegraph::new();
		let swapchain = external(&mut graph, "swapchain");

		let mut offscreen = graph.declare_task("offscreen");
		let off = offscreen
			.create(tex("offscreen", 512, 512), AccessType::ColorAttachmentWrite)
			.unwrap();
		offscreen.finish(|_| Ok(())).unwrap();

		let mut dead = graph.declare_task("dead end");
		dead.create(tex("nobody wants this", 512, 512), AccessType::ColorAttachmentWrite)
			.unwrap();
		dead.finish(|_| Ok(())).unwrap();

		let mut compose = graph.declare_task("compose");
		compose
			.read(off, AccessType::FragmentShaderReadSampledImageOrUniformTexelBuffer)
			.unwrap();
		let (swap_out, _) = compose.write(swapchain, AccessType::ColorAttachmentWrite).unwrap();
		compose.finish(|_| Ok(())).unwrap();

		graph.declare_output(swap_out).unwrap();
		let info = graph.resolve().unwrap();
		(graph, info)
	}

	let (graph_a, info_a) = build();
	let (graph_b, info_b) = build();
	let dot_a = graph_a.dump(&info_a);
	let dot_b = graph_b.dump(&info_b);
	assert_eq!(dot_a, dot_b);

	assert!(dot_a.starts_with("digraph framegraph {"));
	assert!(dot_a.contains("offscreen v0"));
	assert!(dot_a.contains("swapchain v1"));
	assert!(dot_a.contains("READ FragmentShaderReadSampledImageOrUniformTexelBuffer"));
	assert!(dot_a.contains("WRITE ColorAttachmentWrite"));
	assert!(dot_a.contains("dropped"));
	assert!(dot_a.contains("skyblue"));
}
