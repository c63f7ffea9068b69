//! JavaScript evaluation scripts
//!
//! Every script is a function expression; arguments are passed as JSON by
//! [`crate::automation::script_call`], so the same text runs in any frame.
//! Scripts only collect raw facts from the DOM. Deciding what those facts
//! mean (frame roles, document validity, category ids) happens in Rust.

/// Classification signals of one frame
///
/// Argument: marker phrases to look for in the body text.
/// Returns `{ hasNavigation, hasCaseRows, textLength, markers }`.
pub const CLASSIFY_FRAME_SCRIPT: &str = r#"
    (documentMarkers) => {
        const body = document.body;
        if (!body) {
            return { hasNavigation: false, hasCaseRows: false, textLength: 0, markers: [] };
        }
        let neuheiten = false;
        let feldmassnahmen = false;
        for (const li of document.querySelectorAll('li')) {
            const text = li.textContent || '';
            if (text.includes('Neuheiten')) neuheiten = true;
            if (text.includes('Feldmaßnahmen')) feldmassnahmen = true;
            if (neuheiten && feldmassnahmen) break;
        }
        const hasCaseRows = Array.from(document.querySelectorAll('tr'))
            .some(row => /\d+\/\d+/.test(row.textContent || ''));
        const text = body.innerText || '';
        return {
            hasNavigation: neuheiten && feldmassnahmen,
            hasCaseRows,
            textLength: text.length,
            markers: documentMarkers.filter(m => text.includes(m))
        };
    }
"#;

/// Depth-first walk of the category tree below its root item
///
/// Arguments: root label prefix, secondary root marker.
/// Returns `[{ name, href, depth, hasChildren, parent }]` in document order,
/// placeholders included; `parent` is `{ name, href }` or `null` at the top.
pub const COLLECT_CATEGORIES_SCRIPT: &str = r#"
    (rootLabel, rootMarker) => {
        const label = (link) => {
            let name = '';
            for (const node of link.childNodes) {
                if (node.nodeType === Node.TEXT_NODE) name += (node.textContent || '').trim();
            }
            return name || (link.textContent || '').trim();
        };
        const out = [];
        const walk = (li, depth, parent) => {
            const link = li.querySelector(':scope > a');
            if (!link) return;
            const name = label(link);
            if (!name) return;
            const childList = li.querySelector(':scope > ul');
            out.push({
                name,
                href: link.getAttribute('href') || '',
                depth,
                hasChildren: !!childList,
                parent
            });
            if (childList) {
                const current = { name, href: link.getAttribute('href') || '' };
                for (const child of childList.querySelectorAll(':scope > li')) {
                    walk(child, depth + 1, current);
                }
            }
        };
        for (const li of document.querySelectorAll('li')) {
            const text = (li.textContent || '').trim();
            if (!text.startsWith(rootLabel) && !text.includes(rootMarker)) continue;
            const childList = li.querySelector(':scope > ul');
            if (!childList) {
                walk(li, 0, null);
                continue;
            }
            for (const child of childList.querySelectorAll(':scope > li')) {
                walk(child, 1, null);
            }
            break;
        }
        return out;
    }
"#;

/// Direct children of the tree item whose link label equals the argument
///
/// Returns `{ found: false }` when no such item exists, otherwise
/// `{ found: true, children: [{ name, href, hasChildren }] }`.
pub const CHILD_CATEGORIES_SCRIPT: &str = r#"
    (parentLabel) => {
        const label = (link) => {
            let name = '';
            for (const node of link.childNodes) {
                if (node.nodeType === Node.TEXT_NODE) name += (node.textContent || '').trim();
            }
            return (name || (link.textContent || '').trim()).replace(/^image/i, '').trim();
        };
        for (const li of document.querySelectorAll('li')) {
            const link = li.querySelector(':scope > a');
            if (!link || label(link) !== parentLabel) continue;
            const childList = li.querySelector(':scope > ul');
            const children = [];
            if (childList) {
                for (const child of childList.querySelectorAll(':scope > li')) {
                    const childLink = child.querySelector(':scope > a');
                    if (!childLink) continue;
                    children.push({
                        name: label(childLink),
                        href: childLink.getAttribute('href') || '',
                        hasChildren: !!child.querySelector(':scope > ul')
                    });
                }
            }
            return { found: true, children };
        }
        return { found: false, children: [] };
    }
"#;

/// Click the first link whose href contains the target or whose label equals it
pub const CLICK_CATEGORY_SCRIPT: &str = r#"
    (target) => {
        for (const link of document.querySelectorAll('a')) {
            const href = link.getAttribute('href') || '';
            const text = (link.textContent || '').trim().replace(/^image/i, '').trim();
            if (href.includes(target) || text === target) {
                link.click();
                return true;
            }
        }
        return false;
    }
"#;

/// Listing rows that carry a link
///
/// Returns `[{ index, text, href }]` in rendered order.
pub const LIST_DOCUMENTS_SCRIPT: &str = r#"
    () => {
        const rows = [];
        document.querySelectorAll('tr').forEach((row, index) => {
            const link = row.querySelector('a');
            if (!link) return;
            rows.push({
                index,
                text: (row.innerText || row.textContent || '').trim(),
                href: link.getAttribute('href') || ''
            });
        });
        return rows;
    }
"#;

/// Click the link of the first row containing the document key
pub const CLICK_DOCUMENT_SCRIPT: &str = r#"
    (documentKey) => {
        for (const row of document.querySelectorAll('tr')) {
            if (!(row.innerText || row.textContent || '').includes(documentKey)) continue;
            const link = row.querySelector('a');
            if (link) {
                link.click();
                return true;
            }
        }
        return false;
    }
"#;

/// Body text and markup of a frame
///
/// Returns `{ text, html }` or `null` when the frame has no body yet.
pub const DOCUMENT_BODY_SCRIPT: &str = r#"
    () => {
        const body = document.body;
        if (!body) return null;
        return { text: body.innerText || '', html: body.innerHTML || '' };
    }
"#;

/// Rows of a job-screen fieldset
///
/// Argument: fieldset element id. Returns `null` when the fieldset is
/// missing, otherwise `{ id, title, rawText, rows, html }`.
pub const FIELDSET_SCRIPT: &str = r#"
    (fieldsetId) => {
        const fieldset = document.getElementById(fieldsetId);
        if (!fieldset) return null;
        const rows = [];
        fieldset.querySelectorAll('td.label').forEach(cell => {
            const label = (cell.innerText || '').trim();
            if (!label) return;
            const tr = cell.closest('tr');
            const field = tr ? tr.querySelector('td.field, td:nth-of-type(2)') : null;
            let value = '';
            let inputName = null;
            let inputId = null;
            if (field) {
                const input = field.querySelector('input, select, textarea');
                if (input) {
                    value = input.value || input.textContent || '';
                    inputName = input.getAttribute('name');
                    inputId = input.id || null;
                } else {
                    value = field.innerText || '';
                }
            }
            value = value.trim();
            rows.push({ label, value, raw: value, inputName, inputId });
        });
        if (rows.length === 0) {
            fieldset.querySelectorAll('label').forEach(labelEl => {
                const label = (labelEl.innerText || '').trim();
                if (!label) return;
                const sibling = labelEl.nextElementSibling;
                const value = sibling ? (sibling.innerText || '').trim() : '';
                rows.push({ label, value, raw: value, inputName: null, inputId: null });
            });
        }
        const legend = fieldset.querySelector('legend');
        return {
            id: fieldset.id || fieldsetId,
            title: legend ? (legend.innerText || '').trim() || null : null,
            rawText: (fieldset.innerText || '').trim(),
            rows,
            html: fieldset.innerHTML
        };
    }
"#;

/// Absolute target of the first link whose text contains the argument
pub const LINK_HREF_SCRIPT: &str = r#"
    (linkText) => {
        for (const link of document.querySelectorAll('a')) {
            if ((link.textContent || '').includes(linkText)) {
                return link.href || null;
            }
        }
        return null;
    }
"#;

/// Show 100 history rows per page and expand all of them
///
/// Returns `{ paged, expanded }`.
pub const HISTORY_EXPAND_SCRIPT: &str = r#"
    () => {
        let paged = false;
        const select = document.querySelector('select');
        if (select && Array.from(select.options).some(o => o.value === '100' || o.text === '100')) {
            const option = Array.from(select.options).find(o => o.value === '100' || o.text === '100');
            select.value = option.value;
            select.dispatchEvent(new Event('change', { bubbles: true }));
            paged = true;
        }
        const toggle = document.querySelector('div[ng-click="toggleAllRows()"]');
        if (toggle) toggle.click();
        return { paged, expanded: !!toggle };
    }
"#;

/// Raw history rows
///
/// Returns `[{ entryType, fields, tables: [{ title, headers, rows }] }]`.
pub const HISTORY_ROWS_SCRIPT: &str = r#"
    () => {
        const cellTexts = (row, selector) =>
            Array.from(row.querySelectorAll(selector)).map(c => (c.innerText || '').trim());
        const rows = document.querySelectorAll(
            'table#history-table tbody tr[ng-repeat="repair in filteredVehicleHistory"]'
        );
        return Array.from(rows).map(row => {
            const typeEl = row.querySelector('td .col-xs-2 span.text-bold');
            const fields = Array.from(row.querySelectorAll('td .col-xs-2'))
                .map(div => div.innerText || '');
            const tables = Array.from(row.querySelectorAll('table')).map(table => {
                const section = table.closest('div[ng-if]') || table.parentElement;
                const heading = section ? (section.innerText || '').split('\n')[0] : '';
                return {
                    title: heading.trim(),
                    headers: cellTexts(table, 'thead th'),
                    rows: Array.from(table.querySelectorAll('tbody tr'))
                        .map(tr => cellTexts(tr, 'td'))
                };
            });
            return {
                entryType: typeEl ? (typeEl.innerText || '').trim() : '',
                fields,
                tables
            };
        });
    }
"#;
