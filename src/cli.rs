use anyhow::Context as _;
use indicatif::ProgressBar;

use raypack::{
    CastSettings, Projection, Scene, ShadingMode, cast,
    geometry::{ScreenSize, WorldPoint, WorldVector},
};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let obj_path = args
        .next()
        .context("usage: raypack-cli <scene.obj> [output.png]")?;
    let out_path = args.next().unwrap_or_else(|| "raypack.png".to_string());

    let scene = Scene::with_obj(&obj_path).with_context(|| format!("loading {obj_path}"))?;
    scene.print_statistics();

    let flat = scene
        .flatten(ShadingMode::Smooth)
        .context("flattening the scene")?;

    let projection = Projection::builder()
        .center(WorldPoint::new(0.0, 2.0, 10.0))
        .forward(WorldVector::new(0.0, 0.0, -1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .resolution(ScreenSize::new(1024, 768))
        .film_width(36e-3)
        .focal_length(50e-3)
        .build();
    let settings = CastSettings {
        tile_size: 64.try_into().unwrap(),
    };

    let bar = ProgressBar::no_length();
    let mut handle = cast(flat, projection, settings, {
        let bar = bar.clone();
        move |progress| {
            bar.update(|ps| {
                ps.set_len(progress.total as u64);
                ps.set_pos(progress.finished as u64)
            })
        }
    })?;
    bar.set_length(handle.progress().total as u64);

    handle.wait();
    bar.finish();

    let image = handle.image().lock().expect("Poisoned lock!").clone();
    image.save(&out_path).with_context(|| format!("saving {out_path}"))?;
    println!("wrote {out_path}");

    Ok(())
}
