//! Line-oriented unified diff via the Myers O(ND) algorithm.
//!
//! The frontier array `V` is snapshotted at every depth so the edit script
//! can be reconstructed by backtracking. Hunk headers are simplified: a bare
//! `@@` with no line-number ranges. Identical inputs always yield
//! byte-identical output.

/// One edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    /// Copy one line shared by both sides.
    Keep,
    /// Drop one line of the left side.
    Delete,
    /// Emit one line of the right side.
    Insert,
}

/// Split text into lines: `\n` delimits, `\r` is stripped, and a final line
/// without a terminator is included.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for c in text.chars() {
        match c {
            '\n' => out.push(std::mem::take(&mut cur)),
            '\r' => {}
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Compute the edit script turning `a` into `b`.
pub fn myers_ops(a: &[String], b: &[String]) -> Vec<DiffOp> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    if n == 0 && m == 0 {
        return Vec::new();
    }
    let max = n + m;
    let offset = max;
    let mut v = vec![0isize; (2 * max + 1) as usize];
    let mut trace: Vec<Vec<isize>> = Vec::with_capacity(max as usize + 1);

    for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[(offset + k - 1) as usize] < v[(offset + k + 1) as usize])
            {
                v[(offset + k + 1) as usize] // down: insertion
            } else {
                v[(offset + k - 1) as usize] + 1 // right: deletion
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[(offset + k) as usize] = x;
            if x >= n && y >= m {
                return backtrack(&trace, d, n, m, offset);
            }
            k += 2;
        }
    }
    Vec::new()
}

fn backtrack(trace: &[Vec<isize>], depth: isize, n: isize, m: isize, offset: isize) -> Vec<DiffOp> {
    let mut rev = Vec::new();
    let (mut cx, mut cy) = (n, m);
    let mut d = depth;
    while d >= 0 {
        let v = &trace[d as usize];
        let k = cx - cy;
        let (prev_k, down) =
            if k == -d || (k != d && v[(offset + k - 1) as usize] < v[(offset + k + 1) as usize]) {
                (k + 1, true)
            } else {
                (k - 1, false)
            };
        let mut px = v[(offset + prev_k) as usize];
        let py = px - prev_k;
        if !down {
            px += 1; // came from the left: consumed one line of `a`
        }
        while cx > px && cy > py {
            rev.push(DiffOp::Keep);
            cx -= 1;
            cy -= 1;
        }
        if d > 0 {
            rev.push(if down { DiffOp::Insert } else { DiffOp::Delete });
        }
        cx = px;
        cy = py;
        d -= 1;
    }
    rev.reverse();
    rev
}

/// Render a unified diff for two line sequences. `path` only labels the
/// headers; it plays no part in matching.
pub fn unified(a: &[String], b: &[String], path: &str) -> String {
    let ops = myers_ops(a, b);
    let mut out = String::new();
    out.push_str(&format!("--- a/{path}\n"));
    out.push_str(&format!("+++ b/{path}\n"));
    out.push_str("@@\n");

    let (mut ia, mut ib) = (0usize, 0usize);
    for op in ops {
        match op {
            DiffOp::Keep => {
                out.push(' ');
                out.push_str(&a[ia]);
                out.push('\n');
                ia += 1;
                ib += 1;
            }
            DiffOp::Delete => {
                out.push('-');
                out.push_str(&a[ia]);
                out.push('\n');
                ia += 1;
            }
            DiffOp::Insert => {
                out.push('+');
                out.push_str(&b[ib]);
                out.push('\n');
                ib += 1;
            }
        }
    }
    out
}
