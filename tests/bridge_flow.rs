use blendbridge::mesh::{MeshBuffers, Topology};
use blendbridge::transport::ScriptedTransport;
use blendbridge::{BridgeError, Session};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const SENTINEL: u32 = u32::MAX;

/// Queue a minimal unskinned mesh reply: `positions`, mirrored normals,
/// no colors, uvs, bones or materials, and one triangle-fan surface over
/// the given (pos, norm) corner tuples.
fn reply_minimal_mesh(t: &mut ScriptedTransport, positions: &[[f32; 3]], corners: &[[u32; 2]]) {
    t.reply_u32(positions.len() as u32);
    for p in positions {
        t.reply_vec3(p[0], p[1], p[2]);
    }
    t.reply_u32(positions.len() as u32);
    for p in positions {
        t.reply_vec3(p[0], p[1], p[2]);
    }
    t.reply_u32(0); // color layers
    t.reply_u32(0); // uv layers
    t.reply_u32(0); // bones
    t.reply_u32(0); // material sets
    t.reply_vec3(0.0, 0.0, 0.0).reply_vec3(1.0, 1.0, 1.0);
    t.reply_u32(1); // surfaces
    t.reply_vec3(0.5, 0.5, 0.0);
    t.reply_u32(0);
    t.reply_vec3(0.0, 0.0, 0.0).reply_vec3(1.0, 1.0, 1.0);
    t.reply_vec3(0.0, 0.0, 1.0);
    for c in corners {
        t.reply_u32(c[0]).reply_u32(c[1]);
    }
    t.reply_u32(SENTINEL);
}

#[test]
fn compile_mesh_round_trip_releases_lock() {
    init_logger();

    let mut peer = ScriptedTransport::new();
    peer.reply_line("READY").reply_line("OK");
    reply_minimal_mesh(
        &mut peer,
        &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        &[[0, 0], [1, 1]],
    );
    peer.reply_line("DONE");
    let sent = peer.tap();

    let mut session = Session::new(Box::new(peer));
    let mut stream = session.data_stream().unwrap();
    let mesh = stream
        .compile_mesh(Topology::Triangles, 10, &mut |_| {})
        .unwrap();
    stream.close().unwrap();

    assert_eq!(mesh.positions.len(), 2);
    assert_eq!(mesh.surfaces.len(), 1);
    assert!(!mesh.is_skinned());
    assert!(!session.is_stream_open());
    assert_eq!(
        sent.lines(),
        ["DATABEGIN", "MESHCOMPILE TRIANGLES 10", "DATAEND"]
    );
}

#[test]
fn skinned_compile_packs_banked_buffers() {
    init_logger();

    let mut peer = ScriptedTransport::new();
    peer.reply_line("READY").reply_line("OK");
    // One vertex, two bones, one skin set binding both.
    peer.reply_u32(1).reply_vec3(0.0, 0.0, 0.0);
    peer.reply_u32(1).reply_vec3(0.0, 0.0, 1.0);
    peer.reply_u32(0); // color layers
    peer.reply_u32(0); // uv layers
    peer.reply_u32(2).reply_line("hips").reply_line("spine");
    peer.reply_u32(1); // skin sets
    peer.reply_u32(2);
    peer.reply_u32(0).reply_f32(0.25);
    peer.reply_u32(1).reply_f32(0.75);
    peer.reply_u32(1).reply_u32(1); // contiguous vert counts
    peer.reply_u32(0); // material sets
    peer.reply_vec3(0.0, 0.0, 0.0).reply_vec3(0.0, 0.0, 0.0);
    peer.reply_u32(1); // surfaces
    peer.reply_vec3(0.0, 0.0, 0.0);
    peer.reply_u32(0);
    peer.reply_vec3(0.0, 0.0, 0.0).reply_vec3(0.0, 0.0, 0.0);
    peer.reply_vec3(0.0, 0.0, 1.0);
    peer.reply_u32(0).reply_u32(0).reply_u32(0); // one corner
    peer.reply_u32(SENTINEL);
    peer.reply_line("DONE");

    let mut session = Session::new(Box::new(peer));
    let mut stream = session.data_stream().unwrap();
    let mesh = stream
        .compile_mesh_named("hero_body", Topology::TriStrips, 10, &mut |_| {})
        .unwrap();
    stream.close().unwrap();

    assert!(mesh.is_skinned());
    assert_eq!(mesh.bone_names, ["hips", "spine"]);
    assert_eq!(mesh.skin_banks.banks.len(), 1);

    let buffers = MeshBuffers::pack(&mesh);
    // pos + norm + two weight slots.
    assert_eq!(buffers.format.stride(), 12 + 12 + 8);
    assert_eq!(buffers.vertex_count(), 1);
    assert_eq!(buffers.index_count(), 1);
    assert_eq!(buffers.ranges.len(), 1);
    assert_eq!(buffers.ranges[0].surface, 0);
    assert_eq!(buffers.skin_banks.banks[0].bones, [0, 1]);
}

#[test]
fn overflow_poisons_compile_but_not_session() {
    init_logger();

    let mut peer = ScriptedTransport::new();
    peer.reply_line("READY").reply_line("OK");
    // One surface whose only skin set needs 11 bones under a budget of 10.
    peer.reply_u32(1).reply_vec3(0.0, 0.0, 0.0);
    peer.reply_u32(1).reply_vec3(0.0, 0.0, 1.0);
    peer.reply_u32(0);
    peer.reply_u32(0);
    peer.reply_u32(11);
    for b in 0..11 {
        peer.reply_line(&format!("bone_{b}"));
    }
    peer.reply_u32(1);
    peer.reply_u32(11);
    for b in 0..11u32 {
        peer.reply_u32(b).reply_f32(1.0 / 11.0);
    }
    peer.reply_u32(0);
    peer.reply_u32(0);
    peer.reply_vec3(0.0, 0.0, 0.0).reply_vec3(0.0, 0.0, 0.0);
    peer.reply_u32(1);
    peer.reply_vec3(0.0, 0.0, 0.0);
    peer.reply_u32(0);
    peer.reply_vec3(0.0, 0.0, 0.0).reply_vec3(0.0, 0.0, 0.0);
    peer.reply_vec3(0.0, 0.0, 1.0);
    peer.reply_u32(0).reply_u32(0).reply_u32(0);
    peer.reply_u32(SENTINEL);
    peer.reply_line("DONE");
    peer.reply_line("READY").reply_line("DONE");

    let mut session = Session::new(Box::new(peer));
    let mut stream = session.data_stream().unwrap();
    let err = stream
        .compile_mesh(Topology::Triangles, 10, &mut |_| {})
        .unwrap_err();
    match err {
        BridgeError::SkinBankOverflow { surface, bones, budget } => {
            assert_eq!(surface, 0);
            assert_eq!(bones, 11);
            assert_eq!(budget, 10);
        }
        other => panic!("expected SkinBankOverflow, got {other:?}"),
    }
    drop(stream);

    // The failed compile releases the lock; the session opens a new stream.
    assert!(!session.is_stream_open());
    let stream = session.data_stream().unwrap();
    stream.close().unwrap();
}

#[test]
fn actor_compile_round_trip() {
    init_logger();

    let mut peer = ScriptedTransport::new();
    peer.reply_line("READY").reply_line("OK");
    peer.reply_u32(1).reply_line("skeleton");
    peer.reply_u32(1);
    peer.reply_line("hips").reply_vec3(0.0, 0.0, 1.0).reply_i32(-1);
    peer.reply_u32(0); // children
    peer.reply_u32(1);
    peer.reply_line("hero").reply_line("models/hero.blend").reply_i32(0);
    peer.reply_u32(0); // overlays
    peer.reply_u32(0); // actions
    peer.reply_line("DONE");
    let sent = peer.tap();

    let mut session = Session::new(Box::new(peer));
    let mut stream = session.data_stream().unwrap();
    let actor = stream.compile_actor().unwrap();
    stream.close().unwrap();

    assert_eq!(actor.armatures.len(), 1);
    assert_eq!(actor.subtypes[0].mesh_path, "models/hero.blend");
    assert_eq!(sent.lines(), ["DATABEGIN", "ACTORCOMPILE", "DATAEND"]);
}

#[test]
fn script_and_data_streams_alternate() {
    init_logger();

    let mut peer = ScriptedTransport::new();
    peer.reply_line("READY").reply_line("OK").reply_line("DONE");
    peer.reply_line("READY");
    peer.reply_u32(0); // empty mesh list
    peer.reply_line("DONE");
    let sent = peer.tap();

    let mut session = Session::new(Box::new(peer));

    let mut script = session.script_stream().unwrap();
    script.execute("bpy.ops.wm.open_mainfile(filepath='hero.blend')").unwrap();
    script.close().unwrap();

    let mut data = session.data_stream().unwrap();
    assert!(data.mesh_list().unwrap().is_empty());
    data.close().unwrap();

    assert_eq!(
        sent.lines(),
        [
            "PYBEGIN",
            "bpy.ops.wm.open_mainfile(filepath='hero.blend')",
            "PYEND",
            "DATABEGIN",
            "MESHLIST",
            "DATAEND",
        ]
    );
}
