//! Element helpers evaluated inside a frame
//!
//! Each script is a function expression taking the selector as first argument
//! and returning `true` when the element was found and acted upon.

pub const ELEMENT_EXISTS_SCRIPT: &str = r#"(selector) => document.querySelector(selector) !== null"#;

pub const ELEMENT_CLICK_SCRIPT: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    el.scrollIntoView({ block: 'center' });
    el.click();
    return true;
}"#;

pub const ELEMENT_FILL_SCRIPT: &str = r#"(selector, value) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}"#;

pub const ELEMENT_PRESS_ENTER_SCRIPT: &str = r#"(selector) => {
    const el = document.querySelector(selector);
    if (!el) return false;
    el.focus();
    const init = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true, cancelable: true };
    const proceed = el.dispatchEvent(new KeyboardEvent('keydown', init));
    el.dispatchEvent(new KeyboardEvent('keypress', init));
    el.dispatchEvent(new KeyboardEvent('keyup', init));
    if (proceed && el.form) {
        if (typeof el.form.requestSubmit === 'function') {
            el.form.requestSubmit();
        } else {
            el.form.submit();
        }
    }
    return true;
}"#;
