//! Black-box tests driving a real `mlua::Lua` runtime through `dispatch`
//! the way the prompt loop does: a script paused inside a function call,
//! breakpoints set/listed/toggled, locals/globals listed, and a watch
//! expression resolved through a field path.

use std::cell::RefCell;
use std::rc::Rc;

use ldb_agent::dispatch::{dispatch, Outcome};
use ldb_agent::session;
use ldb_wire::message::AgentMessage;
use mlua::Lua;

/// Call `f` from inside a genuine Lua call frame (a tiny chunk invoking a
/// registered probe function), the way the hook callback fires while a
/// frame is actually live on the Lua call stack, and hand back whatever `f`
/// returns. `f` runs exactly once.
fn run_paused<R: 'static>(lua: &Lua, f: impl FnOnce(&Lua) -> R + 'static) -> R {
    let f_cell = RefCell::new(Some(f));
    let result: Rc<RefCell<Option<R>>> = Rc::new(RefCell::new(None));
    let result_for_probe = result.clone();

    let probe = lua
        .create_function(move |lua_ref, ()| {
            if let Some(f) = f_cell.borrow_mut().take() {
                *result_for_probe.borrow_mut() = Some(f(lua_ref));
            }
            Ok(())
        })
        .unwrap();
    lua.globals().set("__probe", probe).unwrap();
    lua.load("__probe()").exec().unwrap();
    lua.globals().set("__probe", mlua::Value::Nil).unwrap();

    result.borrow_mut().take().unwrap()
}

fn reply_body(outcome: Outcome) -> String {
    match outcome {
        Outcome::Reply(AgentMessage::Ok(body)) => body,
        Outcome::Reply(AgentMessage::Err(msg)) => panic!("unexpected ER: {msg}"),
        _ => panic!("expected a Reply outcome"),
    }
}

fn to_tokens(line: &str) -> Vec<String> {
    ldb_wire::message::tokenize(line).unwrap()
}

#[test]
fn breakpoint_lifecycle_through_dispatch() {
    session::teardown(&Lua::new());
    let lua = Lua::new();

    session::with_session(|s| {
        assert!(matches!(
            dispatch(&lua, s, &to_tokens("sb . 10"), "game.lua"),
            Outcome::Reply(AgentMessage::Ok(_))
        ));
        assert!(s.breakpoints.hit("game.lua", 10));

        let body = reply_body(dispatch(&lua, s, &to_tokens("lb"), "game.lua"));
        assert!(body.contains("game.lua"));
        assert!(body.contains("10"));

        assert!(matches!(
            dispatch(&lua, s, &to_tokens("dis 1"), "game.lua"),
            Outcome::Reply(AgentMessage::Ok(_))
        ));
        assert!(!s.breakpoints.hit("game.lua", 10));

        assert!(matches!(
            dispatch(&lua, s, &to_tokens("db 1"), "game.lua"),
            Outcome::Reply(AgentMessage::Ok(_))
        ));
        let body = reply_body(dispatch(&lua, s, &to_tokens("lb"), "game.lua"));
        assert!(body.is_empty());
    });
}

#[test]
fn globals_are_listed_and_watch_resolves_a_global() {
    session::teardown(&Lua::new());
    let lua = Lua::new();
    lua.globals().set("score", 7).unwrap();

    let (listing, watch) = run_paused(&lua, |lua| {
        session::with_session(|s| {
            let listing = reply_body(dispatch(lua, s, &to_tokens("lg 1"), "game.lua"));
            let watch = reply_body(dispatch(lua, s, &to_tokens("w 1 g score"), "game.lua"));
            (listing, watch)
        })
    });

    assert!(listing.contains("score"));
    assert!(watch.starts_with("n7\n"));
}

#[test]
fn watch_with_remember_flag_is_resolvable_relative_to_the_remembered_value() {
    session::teardown(&Lua::new());
    let lua = Lua::new();
    let table = lua.create_table().unwrap();
    table.set("hp", 42).unwrap();
    lua.globals().set("player", table).unwrap();

    let (remembered, nested) = run_paused(&lua, |lua| {
        session::with_session(|s| {
            let remembered = reply_body(dispatch(lua, s, &to_tokens("w 1 g player r"), "game.lua"));
            let nested = reply_body(dispatch(lua, s, &to_tokens("w |s'hp'"), "game.lua"));
            (remembered, nested)
        })
    });

    assert!(remembered.starts_with('t'));
    assert!(nested.starts_with("n42\n"));
}

#[test]
fn unknown_command_returns_the_fixed_wire_message() {
    session::teardown(&Lua::new());
    let lua = Lua::new();
    session::with_session(|s| match dispatch(&lua, s, &to_tokens("bogus"), "game.lua") {
        Outcome::Reply(AgentMessage::Err(msg)) => assert_eq!(msg, "Invalid command!"),
        _ => panic!("expected ER"),
    });
}

#[test]
fn memory_dump_round_trips_a_stack_local() {
    session::teardown(&Lua::new());
    let lua = Lua::new();
    let mut local: u32 = 0xcafef00d;
    let addr = &mut local as *mut u32 as u64;

    session::with_session(|s| {
        match dispatch(&lua, s, &to_tokens(&format!("m 0x{addr:x} 4")), "game.lua") {
            Outcome::MemDump { len, bytes } => {
                assert_eq!(len, 4);
                assert_eq!(bytes, local.to_ne_bytes());
            }
            _ => panic!("expected a MemDump outcome"),
        }
    });
}
