//! stash-cell demo entry point
//!
//! On wasm32 this drives a persisted counter wired to DOM buttons; open a
//! second tab to watch the cells follow each other. Natively there is no DOM,
//! so it runs smoke checks over the in-memory medium.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_demo {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;

    use stash_cell::StashCell;

    /// Demo instance holding the persisted counter
    struct Demo {
        counter: StashCell<i64>,
        shown: Option<i64>,
    }

    impl Demo {
        /// Push the counter into the DOM when it changed since last frame
        fn repaint(&mut self) {
            let value = self.counter.get();
            if self.shown == Some(value) {
                return;
            }
            self.shown = Some(value);

            let document = web_sys::window().unwrap().document().unwrap();
            if let Some(el) = document.get_element_by_id("counter-value") {
                el.set_text_content(Some(&value.to_string()));
            }
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("stash-cell counter demo starting...");

        // local storage, JSON codec, tab sync on - all defaults
        let counter = StashCell::new("counter", 0i64);
        log::info!("counter restored at {}", counter.get());

        let demo = Rc::new(RefCell::new(Demo {
            counter,
            shown: None,
        }));

        setup_buttons(demo.clone());
        request_animation_frame(demo);

        log::info!("counter demo running - open a second tab to watch it follow");
    }

    fn setup_buttons(demo: Rc<RefCell<Demo>>) {
        let window = web_sys::window().unwrap();
        let document = window.document().unwrap();

        // Increment
        if let Some(btn) = document.get_element_by_id("increment") {
            let demo = demo.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                demo.borrow().counter.update(|n| n + 1);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Decrement
        if let Some(btn) = document.get_element_by_id("decrement") {
            let demo = demo.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                demo.borrow().counter.update(|n| n - 1);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Reset to the construction-time value
        if let Some(btn) = document.get_element_by_id("reset") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                demo.borrow().counter.reset();
                log::info!("counter reset");
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(demo: Rc<RefCell<Demo>>) {
        let window = web_sys::window().unwrap();
        let closure = Closure::once(move |_time: f64| {
            demo_loop(demo);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn demo_loop(demo: Rc<RefCell<Demo>>) {
        demo.borrow_mut().repaint();
        request_animation_frame(demo);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_demo::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("stash-cell (native) starting...");
    log::info!("no DOM here - cells run over the in-memory medium");

    println!("\nRunning persistence smoke checks...");
    smoke_reload_cycle();
    smoke_foreign_change();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn smoke_reload_cycle() {
    use stash_cell::StashCell;

    let counter = StashCell::new("smoke-counter", 0i64);
    counter.set(5);
    counter.update(|n| n * 2);
    drop(counter);

    // a second cell over the same ambient medium sees the persisted value
    let counter = StashCell::new("smoke-counter", 0i64);
    assert_eq!(counter.get(), 10, "value should survive the first cell");
    println!("✓ Reload cycle smoke check passed!");
}

#[cfg(not(target_arch = "wasm32"))]
fn smoke_foreign_change() {
    use std::rc::Rc;

    use stash_cell::StashCell;
    use stash_cell::backend::MemoryArea;

    let area: Rc<MemoryArea> = Rc::default();
    let cell = StashCell::builder("counter", 0i64).area(area.clone()).build();
    cell.set(5);

    area.emit_foreign_change("counter", Some("10"));
    assert_eq!(cell.get(), 10, "foreign change should apply");
    println!("✓ Foreign change smoke check passed!");
}
