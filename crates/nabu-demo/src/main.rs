//! Drives a few headless frames through the instance manager and logs what
//! reached the pass. Run with `RUST_LOG=debug` to see cache and pool activity.

use anyhow::{ensure, Result};
use nabu_render::gfx::headless::{HeadlessDevice, RecordingPass};
use nabu_render::gfx::{
    premultiplied_alpha_blend, BindingLayout, MegaStatePatch, SamplerBinding, UniformArena,
};
use nabu_render::logging::{init_logging, LoggingConfig};
use nabu_render::{InstanceManager, InstanceManagerConfig};

const SPRITES: u32 = 24;
const FRAMES: u32 = 3;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut device = HeadlessDevice::new();
    let mut uniforms = UniformArena::new(device.create_buffer());
    let mut mgr = InstanceManager::with_config(InstanceManagerConfig {
        initial_capacity: SPRITES as usize + 4,
    });

    let sprite_program = device.create_program();
    let layout = device.create_input_layout();
    let quad = device.create_input_state(layout);
    let atlas = SamplerBinding {
        sampler: Some(device.create_sampler()),
        texture: Some(device.create_texture()),
    };

    // The sprite shader is still "compiling" during the first frame.
    device.set_program_compiling(sprite_program, true);

    let mut pass = RecordingPass::new();
    for frame in 0..FRAMES {
        pass.clear();
        uniforms.reset();

        let t = mgr.push_template();
        {
            let tmpl = mgr.instance_mut(t);
            tmpl.set_program(sprite_program);
            tmpl.set_input_state(&device, quad);
            tmpl.set_mega_state_flags(
                &MegaStatePatch::default()
                    .blend(Some(premultiplied_alpha_blend()))
                    .depth(wgpu::CompareFunction::Always, false),
            );
            tmpl.set_binding_layout(BindingLayout::new(1, 1));
            tmpl.set_sampler_bindings(&[atlas]);
            tmpl.set_draw(true, 6, 0);
        }

        for i in 0..SPRITES {
            let id = mgr.push_instance();
            let inst = mgr.instance_mut(id);
            // Back-to-front: farther sprites get smaller keys.
            inst.set_sort_key(SPRITES - i);
            inst.allocate_uniform_buffer(&mut uniforms, 0, 8);
            let params = inst.map_uniform_buffer_f32(&mut uniforms, 0);
            params.copy_from_slice(&[i as f32, 0.0, 16.0, 16.0, 1.0, 1.0, 1.0, 1.0]);
        }
        mgr.pop_template();

        let stats = mgr.execute_and_reset(&mut device, &uniforms, &mut pass);
        log::info!(
            "frame {frame}: {} submitted, {} waiting on pipelines, {} uniform words",
            stats.submitted,
            stats.skipped_not_ready,
            uniforms.used_words()
        );

        if frame == 0 {
            ensure!(stats.submitted == 0, "nothing should draw while the shader compiles");
            device.set_program_compiling(sprite_program, false);
        } else {
            ensure!(stats.submitted == SPRITES as usize, "expected every sprite to draw");
            ensure!(pass.draws().len() == SPRITES as usize, "pass kept draws from an earlier frame");
            log::debug!("frame {frame}: {} pass commands", pass.commands().len());
        }
    }

    log::info!(
        "cache holds {} pipelines and {} binding sets",
        mgr.cache().num_pipelines(),
        mgr.cache().num_bindings()
    );

    mgr.destroy(&mut device);
    ensure!(device.live_objects() == 0, "device objects leaked");
    Ok(())
}
