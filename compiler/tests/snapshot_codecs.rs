// Snapshot tests: lock every textual form of a text-to-image workflow.
//
// Uses the repository templates and the library codecs directly. Snapshots
// are managed by `insta` and stored under `compiler/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use std::path::{Path, PathBuf};

use flowc::graph::CompiledGraph;
use flowc::registry::Registry;

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn load_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .load_dir(&project_root().join("templates"))
        .unwrap_or_else(|e| panic!("failed to load templates: {e}"));
    registry
}

const TEXT_TO_IMAGE: &str = r#"
loader = CheckpointLoaderSimple(ckpt_name="dreamshaper_8.safetensors")
positive = CLIPTextEncode(text="a castle on a hill, golden hour")
negative = CLIPTextEncode(text="blurry")
latent = EmptyLatentImage(width=768)
sampler = KSampler(seed=42, steps=25, cfg=7.5)
decode = VAEDecode()
save = SaveImage(filename_prefix="castle")

model, clip, vae = loader()
pos = positive(clip=clip)
neg = negative(clip=clip)
empty = latent()
samples = sampler(model=model, positive=pos, negative=neg, latent_image=empty)
image = decode(samples=samples, vae=vae)
save(images=image)
"#;

fn text_to_image(registry: &Registry) -> CompiledGraph {
    flowc::sequential::parse(TEXT_TO_IMAGE, registry)
        .unwrap_or_else(|d| panic!("compile failed:\n{d}"))
}

#[test]
fn sequential_text_to_image() {
    let reg = load_registry();
    let text = flowc::sequential::serialize(&text_to_image(&reg)).unwrap();
    insta::assert_snapshot!("sequential_text_to_image", text);
}

#[test]
fn staged_text_to_image() {
    let reg = load_registry();
    let text = flowc::staged::serialize(&text_to_image(&reg)).unwrap();
    insta::assert_snapshot!("staged_text_to_image", text);
}

#[test]
fn markdown_text_to_image() {
    let reg = load_registry();
    let text = flowc::markdown::serialize(&text_to_image(&reg));
    insta::assert_snapshot!("markdown_text_to_image", text);
}

#[test]
fn natural_text_to_image() {
    let reg = load_registry();
    let text = flowc::natural::serialize(&text_to_image(&reg)).unwrap();
    insta::assert_snapshot!("natural_text_to_image", text);
}

#[test]
fn diagnostic_type_mismatch() {
    let reg = load_registry();
    let src = "image = LoadImage()\nsampler = KSampler()\npixels, mask = image()\n\
               out = sampler(latent_image=pixels)\n";
    let diag = flowc::sequential::parse(src, &reg).unwrap_err();
    insta::assert_snapshot!("diagnostic_type_mismatch", diag.to_string());
}
