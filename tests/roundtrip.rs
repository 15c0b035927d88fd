use pani_tools::formats::animation::{Animation, Background, SLOT_COUNT};
use pani_tools::formats::catalog::{Catalog, CatalogEntry};
use pani_tools::formats::image::SharedImage;
use pani_tools::formats::script::{Instruction, Script, Step};
use pani_tools::AssetError;

fn noisy_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut state: u32 = 0xDEAD_BEEF;
    (0..width * height)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 24) & 0x0F) as u8
        })
        .collect()
}

fn empty_script() -> Script {
    Script {
        instructions: vec![Instruction::SceneStart, Instruction::End],
        steps: Vec::new(),
        instruction_labels: Vec::new(),
        data_labels: Vec::new(),
    }
}

fn base_animation() -> Animation {
    let mut slots = vec![0u16; SLOT_COUNT];
    slots[0] = 1;
    Animation {
        tag: pani_tools::formats::animation::DEFAULT_TAG,
        color_remap: [0; 15],
        width: 320,
        height: 200,
        frame_skip: 0,
        background: Background::ClearToColor {
            color: 0,
            unknown: 0,
        },
        slots,
        images: vec![SharedImage::new(8, 8, noisy_pixels(8, 8), None).unwrap()],
        script: empty_script(),
    }
}

#[test]
fn large_image_survives_the_full_pipeline() {
    let image = SharedImage::new(64, 50, noisy_pixels(64, 50), None).unwrap();
    let bytes = image.to_bytes().unwrap();
    let back = SharedImage::from_bytes(&bytes).unwrap();
    assert_eq!(back, image);
}

#[test]
fn odd_width_image_file_is_a_fixed_point() {
    let image = SharedImage::new(37, 21, noisy_pixels(37, 21), None).unwrap();
    let bytes = image.to_bytes().unwrap();
    let back = SharedImage::from_bytes(&bytes).unwrap();
    assert_eq!(back.width, 38);
    assert_eq!(back.to_bytes().unwrap(), bytes);
}

#[test]
fn format_flag_rejection_produces_no_partial_result() {
    let image = SharedImage::new(4, 4, noisy_pixels(4, 4), None).unwrap();
    let mut bytes = image.to_bytes().unwrap();
    bytes[0] = 0x09;
    match SharedImage::from_bytes(&bytes) {
        Err(AssetError::UnsupportedFormat(0x09)) => {}
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }
}

#[test]
fn catalog_of_mixed_images_round_trips() {
    let mut remap = [0u8; 16];
    remap[1] = 0x8F;
    let catalog = Catalog {
        entries: vec![
            CatalogEntry {
                name: "SKYLINE".to_string(),
                image: SharedImage::new(16, 10, noisy_pixels(16, 10), None).unwrap(),
            },
            CatalogEntry {
                name: "BADGE".to_string(),
                image: SharedImage::new(8, 8, noisy_pixels(8, 8), Some(remap)).unwrap(),
            },
        ],
    };
    let bytes = catalog.to_bytes().unwrap();
    assert_eq!(Catalog::from_bytes(&bytes).unwrap(), catalog);
}

#[test]
fn forward_jump_label_resolves_after_round_trip() {
    let mut animation = base_animation();
    animation.script = Script {
        instructions: vec![
            Instruction::SceneStart,
            Instruction::JumpIfFalse { target: 0 },
            Instruction::CompareEqual { lhs: 1, rhs: 2 },
            Instruction::WaitFrame,
            Instruction::End,
        ],
        steps: Vec::new(),
        instruction_labels: vec![Some(3)],
        data_labels: Vec::new(),
    };

    let bytes = animation.to_bytes().unwrap();
    let back = Animation::from_bytes(&bytes).unwrap();
    assert_eq!(back.script.instruction_labels, vec![Some(3)]);
    assert_eq!(back.script.instructions[3], Instruction::WaitFrame);
    assert_eq!(back.script, animation.script);
}

#[test]
fn backward_jump_label_resolves_after_round_trip() {
    let mut animation = base_animation();
    animation.script = Script {
        instructions: vec![
            Instruction::SceneStart,
            Instruction::WaitFrame,
            Instruction::Jump { target: 0 },
            Instruction::End,
        ],
        steps: Vec::new(),
        instruction_labels: vec![Some(1)],
        data_labels: Vec::new(),
    };

    let bytes = animation.to_bytes().unwrap();
    let back = Animation::from_bytes(&bytes).unwrap();
    assert_eq!(back.script.instruction_labels, vec![Some(1)]);
    assert_eq!(back.script, animation.script);
}

#[test]
fn animation_with_sprite_sequences_round_trips() {
    let mut animation = base_animation();
    animation.script = Script {
        instructions: vec![
            Instruction::SceneStart,
            Instruction::SetupSprite {
                sprite: 0,
                x: 40,
                y: 60,
                sequence: 0,
            },
            Instruction::WaitFrame,
            Instruction::End,
        ],
        steps: vec![
            Step::SetImage(0),
            Step::SetPosition { x: 40, y: 60 },
            Step::Move { dx: 2, dy: -1 },
            Step::Wait(3),
            Step::SetCounter(5),
            Step::JumpIfCounter { target: 1 },
            Step::EndSequence,
        ],
        instruction_labels: Vec::new(),
        // Label 0 opens the sequence, label 1 is the counter-loop target.
        data_labels: vec![Some(0), Some(2)],
    };

    let bytes = animation.to_bytes().unwrap();
    let back = Animation::from_bytes(&bytes).unwrap();
    assert_eq!(back.script, animation.script);
    assert_eq!(back.to_bytes().unwrap(), bytes);
}

#[test]
fn animation_with_background_image_round_trips() {
    let mut animation = base_animation();
    animation.background =
        Background::ClearToImage(SharedImage::new(10, 6, noisy_pixels(10, 6), None).unwrap());

    let bytes = animation.to_bytes().unwrap();
    let back = Animation::from_bytes(&bytes).unwrap();
    assert_eq!(back.background, animation.background);
    assert_eq!(back.to_bytes().unwrap(), bytes);
}
