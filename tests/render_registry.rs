//! GPU resource lifetimes driven by scene events through the rendering system.

use cgmath::{Matrix4, Point3, SquareMatrix};
use voxel_world::{
    engine_state::{
        rendering::{
            assets::Asset,
            material::{Material, MaterialValue, Program, Shader, ShaderStage},
            mesh_builder::MeshBuilder,
            texture::Texture,
            CameraView, HeadlessContext, RenderingSystem,
        },
        scene::{EntityConfig, MaterialComponent, Scene},
    },
    error::EngineError,
};

fn camera() -> CameraView {
    CameraView {
        view_proj: Matrix4::identity(),
        position: Point3::new(0.0, 0.0, 0.0),
    }
}

fn program(name: &str) -> Program {
    Program::new(
        Shader::inline(format!("{name}.vert"), ShaderStage::Vertex, ""),
        Shader::inline(format!("{name}.frag"), ShaderStage::Fragment, ""),
    )
}

fn chunk_material(program: &Program, atlas: &Texture) -> MaterialComponent {
    MaterialComponent {
        program: program.clone(),
        material: Material::new().with("albedo", MaterialValue::Texture(atlas.clone())),
    }
}

fn cube(scene: &mut Scene, material: MaterialComponent) -> EntityConfig {
    let mut builder = MeshBuilder::default();
    builder.add_cube(0.0, 0.0, 0.0, 2);
    let mesh = scene.add_mesh(builder.build().unwrap());
    EntityConfig::default().with_mesh(mesh).with_material(material)
}

#[test]
fn shared_resources_outlive_their_first_owner() {
    let mut scene = Scene::new();
    let program = program("chunk");
    let atlas = Texture::solid("atlas", [200, 200, 200, 255]);
    let first = cube(&mut scene, chunk_material(&program, &atlas));
    let first = scene.instantiate(first).unwrap();
    let second = cube(&mut scene, chunk_material(&program, &atlas));
    let second = scene.instantiate(second).unwrap();

    let mut system = RenderingSystem::new(HeadlessContext::new(), [0.5, 0.7, 0.9, 1.0]);
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!(report.registered, 2);
    assert_eq!(report.frame.drawn, 2);
    assert_eq!(system.pipeline().context().mesh_count(), 2);

    scene.destroy(first);
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!(report.cleanup.meshes, 1);
    assert_eq!((report.cleanup.textures, report.cleanup.programs, report.cleanup.shaders), (0, 0, 0));
    let context = system.pipeline().context();
    assert!(context.has_texture(atlas.id()));
    assert!(context.has_program(&program.id()));
    assert_eq!(context.last_frame().len(), 1);

    scene.destroy(second);
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!(report.cleanup.meshes, 1);
    assert_eq!(report.cleanup.textures, 1);
    assert_eq!(report.cleanup.programs, 1);
    assert_eq!(report.cleanup.shaders, 2);
    assert_eq!(report.cleanup.deferred, 0);

    let stats = system.pipeline().context().stats();
    assert_eq!(stats.meshes_destroyed, 2);
    assert_eq!(stats.textures_destroyed, 1);
    assert_eq!(stats.programs_destroyed, 1);
    assert_eq!(stats.shaders_destroyed, 2);
    assert!(system.pipeline().registry().textures.is_empty());
}

#[test]
fn replacing_a_chunk_in_one_tick_keeps_the_atlas() {
    let mut scene = Scene::new();
    let program = program("chunk");
    let atlas = Texture::solid("atlas", [255; 4]);
    let old = cube(&mut scene, chunk_material(&program, &atlas));
    let old = scene.instantiate(old).unwrap();

    let mut system = RenderingSystem::new(HeadlessContext::new(), [0.0; 4]);
    system.late_update(&mut scene, &camera()).unwrap();

    scene.destroy(old);
    let replacement = cube(&mut scene, chunk_material(&program, &atlas));
    scene.instantiate(replacement).unwrap();
    let report = system.late_update(&mut scene, &camera()).unwrap();

    assert_eq!((report.registered, report.unregistered), (1, 1));
    assert_eq!(report.cleanup.meshes, 1);
    assert_eq!(report.cleanup.textures, 0);
    let stats = system.pipeline().context().stats();
    assert_eq!(stats.texture_uploads, 1);
    assert_eq!(stats.programs_linked, 1);
    assert_eq!(report.frame.drawn, 1);
}

#[test]
fn loading_assets_skip_draws_until_ready() {
    let mut scene = Scene::new();
    let (source, sender) = Asset::pending();
    let program = Program::new(
        Shader::with_source("late.vert", ShaderStage::Vertex, source),
        Shader::inline("late.frag", ShaderStage::Fragment, ""),
    );
    let (image, image_sender) = Asset::pending();
    let atlas = Texture::with_image("late atlas", image);
    let chunk = cube(&mut scene, chunk_material(&program, &atlas));
    let chunk = scene.instantiate(chunk).unwrap();

    let mut system = RenderingSystem::new(HeadlessContext::new(), [0.0; 4]);
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!((report.frame.drawn, report.frame.skipped), (0, 1));

    sender.complete(Ok("// vertex".to_owned()));
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!((report.frame.drawn, report.frame.skipped), (0, 1));

    image_sender.complete(Ok(image::RgbaImage::new(2, 2)));
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!((report.frame.drawn, report.frame.skipped), (1, 0));

    scene.destroy(chunk);
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!(report.cleanup.deferred, 0);
    assert!(system.pipeline().registry().shaders.is_empty());
}

#[test]
fn shader_still_loading_is_destroyed_once_loaded() {
    let mut scene = Scene::new();
    let (source, sender) = Asset::pending();
    let program = Program::new(
        Shader::with_source("slow.vert", ShaderStage::Vertex, source),
        Shader::inline("slow.frag", ShaderStage::Fragment, ""),
    );
    let chunk = cube(&mut scene, chunk_material(&program, &Texture::solid("white", [255; 4])));
    let chunk = scene.instantiate(chunk).unwrap();

    let mut system = RenderingSystem::new(HeadlessContext::new(), [0.0; 4]);
    system.late_update(&mut scene, &camera()).unwrap();
    scene.destroy(chunk);
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!(report.cleanup.shaders, 1);
    assert_eq!(report.cleanup.deferred, 1);
    assert!(system.pipeline().registry().shaders.is_pending(program.vertex.id()));

    sender.complete(Ok("// vertex".to_owned()));
    let report = system.late_update(&mut scene, &camera()).unwrap();
    assert_eq!(report.cleanup.shaders, 1);
    assert_eq!(report.cleanup.deferred, 0);
}

#[test]
fn compile_failure_aborts_the_frame() {
    let mut scene = Scene::new();
    let program = program("broken");
    let chunk = cube(&mut scene, chunk_material(&program, &Texture::solid("white", [255; 4])));
    scene.instantiate(chunk).unwrap();

    let mut context = HeadlessContext::new();
    context.fail_shader(program.fragment.id().clone());
    let mut system = RenderingSystem::new(context, [0.0; 4]);
    let result = system.late_update(&mut scene, &camera());
    assert!(matches!(
        result,
        Err(EngineError::ShaderCompilation { id, .. }) if id == "broken.frag"
    ));
}
