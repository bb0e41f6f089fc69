//! Frame-budget admission and completion-drain behaviour.

mod util;

use std::sync::Arc;
use std::time::Duration;

use retex_core::{Config, Resolved, ScaleService, WrapFlags};
use util::{async_service_with, GatedUpscaler, TestTexture};

const IDLE: Duration = Duration::from_secs(5);

fn resolve(service: &ScaleService, tex: &TestTexture) -> Resolved {
    service.resolve(tex, None, WrapFlags::empty())
}

#[test]
fn first_request_is_admitted_even_when_the_budget_is_too_small() {
    // 16x16 = 256 texels against a budget of 10.
    let service = async_service_with(|config| {
        config.async_scaling.budget_per_frame_texels = 10;
    });
    let a = TestTexture::new(1, "a", 16, 16, 1);
    let b = TestTexture::new(2, "b", 16, 16, 2);

    service.begin_frame();
    assert!(resolve(&service, &a).is_original());
    assert_eq!(service.stats().jobs_spawned, 1);

    // Same frame, budget already negative: deferred, no job.
    assert!(resolve(&service, &b).is_original());
    let stats = service.stats();
    assert_eq!(stats.jobs_spawned, 1);
    assert_eq!(stats.deferred, 1);

    // A fresh frame restores the first-request privilege.
    service.begin_frame();
    assert!(resolve(&service, &b).is_original());
    assert_eq!(service.stats().jobs_spawned, 2);
}

#[test]
fn requests_within_budget_are_all_admitted() {
    let service = async_service_with(|config| {
        config.async_scaling.budget_per_frame_texels = 1_000;
        config.async_scaling.max_in_flight = 4;
    });
    let a = TestTexture::new(1, "a", 16, 16, 1);
    let b = TestTexture::new(2, "b", 16, 16, 2);
    let c = TestTexture::new(3, "c", 16, 16, 3);

    service.begin_frame();
    assert!(resolve(&service, &a).is_original());
    assert!(resolve(&service, &b).is_original());
    assert!(resolve(&service, &c).is_original());
    assert_eq!(service.stats().jobs_spawned, 3);
    assert_eq!(service.stats().deferred, 0);
}

#[test]
fn scaled_results_arrive_after_present() {
    let service = async_service_with(|_| {});
    let tex = TestTexture::new(1, "a", 16, 16, 1);

    service.begin_frame();
    assert!(resolve(&service, &tex).is_original());
    assert!(service.wait_idle(IDLE));
    assert_eq!(service.pending_completions(), 1);

    service.present();
    assert_eq!(service.pending_completions(), 0);

    match resolve(&service, &tex) {
        Resolved::Scaled(record) => {
            assert!(record.is_ready());
            assert_eq!(record.output_size(), Some((32, 32)));
        }
        Resolved::Original => panic!("record should be ready after the drain"),
    }
    assert_eq!(service.stats().structural_hits, 1);
}

#[test]
fn in_flight_requests_converge_without_duplicate_jobs() {
    let (gated, gate) = GatedUpscaler::new();
    let service = ScaleService::new(Config::default(), Arc::new(gated)).unwrap();
    let tex = TestTexture::new(1, "a", 16, 16, 1);

    service.begin_frame();
    assert!(resolve(&service, &tex).is_original());
    // The record is installed while still scaling: repeat draws see a
    // pending entry and do not schedule again.
    assert!(resolve(&service, &tex).is_original());
    assert!(resolve(&service, &tex).is_original());
    let stats = service.stats();
    assert_eq!(stats.jobs_spawned, 1);
    assert_eq!(stats.pending_hits, 2);

    gate.send(()).unwrap();
    assert!(service.wait_idle(IDLE));
    service.present();
    assert!(matches!(resolve(&service, &tex), Resolved::Scaled(_)));
}

#[test]
fn admissions_past_the_in_flight_cap_are_deferred() {
    let (gated, gate) = GatedUpscaler::new();
    let mut config = Config::default();
    config.async_scaling.max_in_flight = 1;
    config.async_scaling.budget_per_frame_texels = 1_000_000;
    let service = ScaleService::new(config, Arc::new(gated)).unwrap();

    let a = TestTexture::new(1, "a", 16, 16, 1);
    let b = TestTexture::new(2, "b", 16, 16, 2);

    service.begin_frame();
    assert!(resolve(&service, &a).is_original());
    assert!(resolve(&service, &b).is_original());
    let stats = service.stats();
    assert_eq!(stats.jobs_spawned, 1);
    assert_eq!(stats.deferred, 1);

    gate.send(()).unwrap();
    assert!(service.wait_idle(IDLE));

    // With the pool drained the deferred resource is admitted next frame.
    service.begin_frame();
    assert!(resolve(&service, &b).is_original());
    assert_eq!(service.stats().jobs_spawned, 2);
    gate.send(()).unwrap();
    assert!(service.wait_idle(IDLE));
}

#[test]
fn over_allowance_drains_run_from_the_back_in_reverse_order() {
    let service = async_service_with(|config| {
        config.async_scaling.max_loads_per_frame = 2;
        config.async_scaling.can_fetch_and_load_same_frame = false;
        config.async_scaling.max_in_flight = 1;
        config.async_scaling.budget_per_frame_texels = 1_000_000;
    });
    let a = TestTexture::new(1, "a", 16, 16, 1);
    let b = TestTexture::new(2, "b", 16, 16, 2);
    let c = TestTexture::new(3, "c", 16, 16, 3);

    // Serialize the jobs so the completion queue order is a, b, c.
    for tex in [&a, &b, &c] {
        service.begin_frame();
        assert!(resolve(&service, tex).is_original());
        assert!(service.wait_idle(IDLE));
    }
    assert_eq!(service.pending_completions(), 3);

    // Allowance 2 < 3: exactly the two most recent completions run.
    service.begin_frame();
    service.present();
    assert_eq!(service.pending_completions(), 1);
    assert!(resolve(&service, &a).is_original());
    assert!(matches!(resolve(&service, &b), Resolved::Scaled(_)));
    assert!(matches!(resolve(&service, &c), Resolved::Scaled(_)));

    // The survivor drains on the next present.
    service.begin_frame();
    service.present();
    assert_eq!(service.pending_completions(), 0);
    assert!(matches!(resolve(&service, &a), Resolved::Scaled(_)));
}

#[test]
fn same_frame_loading_disabled_skips_that_frames_drain() {
    let service = async_service_with(|config| {
        config.async_scaling.can_fetch_and_load_same_frame = false;
    });
    let tex = TestTexture::new(1, "a", 16, 16, 1);

    service.begin_frame();
    assert!(resolve(&service, &tex).is_original());
    assert!(service.wait_idle(IDLE));
    assert_eq!(service.pending_completions(), 1);

    // This frame admitted a job, so its present does not drain.
    service.present();
    assert_eq!(service.pending_completions(), 1);

    // The next frame admitted nothing and drains normally.
    service.begin_frame();
    service.present();
    assert_eq!(service.pending_completions(), 0);
}

#[test]
fn same_frame_loading_enabled_drains_inside_resolve() {
    let service = async_service_with(|config| {
        config.async_scaling.budget_per_frame_texels = 1_000_000;
    });
    let a = TestTexture::new(1, "a", 16, 16, 1);
    let b = TestTexture::new(2, "b", 16, 16, 2);

    service.begin_frame();
    assert!(resolve(&service, &a).is_original());
    assert!(service.wait_idle(IDLE));
    assert_eq!(service.pending_completions(), 1);

    // Admitting the next job consumes the finished completion inline.
    assert!(resolve(&service, &b).is_original());
    assert_eq!(service.pending_completions(), 0);
    assert!(matches!(resolve(&service, &a), Resolved::Scaled(_)));
    assert!(service.wait_idle(IDLE));
}

#[test]
fn results_for_disposed_resources_are_never_installed() {
    let (gated, gate) = GatedUpscaler::new();
    let service = ScaleService::new(Config::default(), Arc::new(gated)).unwrap();
    let tex = TestTexture::new(1, "a", 16, 16, 1);

    service.begin_frame();
    assert!(resolve(&service, &tex).is_original());

    // Dispose while the job is in flight; the job still runs to completion.
    service.notify_disposed(tex.texture_id());
    gate.send(()).unwrap();
    assert!(service.wait_idle(IDLE));
    service.present();

    // The completion materialized and was dropped: nothing reachable, no
    // leaked output bytes.
    let dump = service.dump_stats();
    assert_eq!(dump.structural_entries, 0);
    assert_eq!(dump.counters.jobs_completed, 1);
    assert_eq!(dump.total_output_bytes, 0);
}
