use std::{
    ops::Deref as _,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

use image::{GenericImage, GenericImageView, RgbaImage};

use crate::{
    caster::{CastSettings, Projection, worker},
    scene::Object,
    screen_block::ScreenBlock,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CastProgress {
    pub finished: usize,
    pub total: usize,
}

/// Casts one frame with a thread per core. Tiles are handed out through an
/// atomic counter; each worker owns its tile buffer and merges finished
/// tiles into the shared image. Returns immediately, the frame finishes in
/// the background.
pub fn cast<O, F>(
    scene: O,
    projection: Projection,
    settings: CastSettings,
    finished_tile_callback: F,
) -> anyhow::Result<CastHandle<O>>
where
    O: Object + Send + Sync + 'static,
    F: Fn(CastProgress) + Send + Sync + 'static,
{
    let resolution = projection.resolution();
    let image = RgbaImage::new(resolution.x, resolution.y);
    let state = Arc::new(CastState {
        scene,
        projection,

        image: Mutex::new(image),

        tile_ordering: ScreenBlock::from_size(resolution).tile_ordering(settings.tile_size),
        next_tile_index: AtomicUsize::new(0),
        finished_tile_count: AtomicUsize::new(0),
    });
    let finished_tile_callback = Arc::new(finished_tile_callback);

    let cores = core_affinity::get_core_ids()
        .expect("We need a CPU list!")
        .into_iter()
        .enumerate();

    let threads = cores
        .map(|(worker_id, core)| {
            let state = Arc::clone(&state);
            let finished_tile_callback = Arc::clone(&finished_tile_callback);

            thread::Builder::new()
                .name(format!("caster{worker_id}"))
                .spawn(move || {
                    core_affinity::set_for_current(core);

                    let mut buffer =
                        RgbaImage::new(settings.tile_size.into(), settings.tile_size.into());

                    while let Some(tile) = state.get_next_tile() {
                        worker::cast_tile(&state.scene, &state.projection, tile, &mut buffer);

                        state
                            .image
                            .lock()
                            .expect("Poisoned lock!")
                            .copy_from(
                                buffer.view(0, 0, tile.width(), tile.height()).deref(),
                                tile.min.x,
                                tile.min.y,
                            )
                            .unwrap_or_else(|_| {
                                unreachable!("The buffer should always fit into the output")
                            });

                        let finished =
                            state.finished_tile_count.fetch_add(1, Ordering::AcqRel) + 1;
                        (finished_tile_callback)(CastProgress {
                            finished,
                            total: state.tile_ordering.len(),
                        });
                    }
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CastHandle {
        state,
        threads,
    })
}

pub struct CastHandle<O: Object> {
    state: Arc<CastState<O>>,
    threads: Vec<JoinHandle<()>>,
}

impl<O: Object> CastHandle<O> {
    pub fn progress(&self) -> CastProgress {
        let total = self.state.tile_ordering.len();
        CastProgress {
            finished: self
                .state
                .finished_tile_count
                .load(Ordering::Acquire)
                .min(total),
            total,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(|handle| handle.is_finished())
    }

    /// Signal the workers to abort.
    /// Any running workers will still finish their tiles, but no new ones
    /// will be started.
    pub fn abort(&self) {
        self.state
            .next_tile_index
            .store(self.state.tile_ordering.len(), Ordering::Release);
    }

    /// Wait for the workers to finish.
    pub fn wait(&mut self) {
        self.threads
            .drain(..)
            .for_each(|handle| handle.join().expect("A caster thread panicked"));
    }

    pub fn image(&self) -> &Mutex<RgbaImage> {
        &self.state.image
    }
}

struct CastState<O: Object> {
    scene: O,
    projection: Projection,

    image: Mutex<RgbaImage>,

    tile_ordering: Vec<ScreenBlock>,
    next_tile_index: AtomicUsize,
    finished_tile_count: AtomicUsize,
}

impl<O: Object> CastState<O> {
    fn get_next_tile(&self) -> Option<&ScreenBlock> {
        let id = self.next_tile_index.fetch_add(1, Ordering::AcqRel);
        self.tile_ordering.get(id)
    }
}
