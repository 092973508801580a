use std::collections::VecDeque;

/// Lost-in-the-middle reordering of a best-first list.
///
/// Even ranks fill the front in order and odd ranks fill the back from the
/// end inwards, so the strongest items sit at both edges of the context.
/// `[r0, r1, r2, r3]` becomes `[r0, r2, r3, r1]`.
pub fn reorder<T>(ranked: Vec<T>) -> Vec<T> {
    let len = ranked.len();
    let mut front = Vec::with_capacity(len);
    let mut back = VecDeque::with_capacity(len / 2);

    for (rank, item) in ranked.into_iter().enumerate() {
        if rank % 2 == 0 {
            front.push(item);
        } else {
            back.push_front(item);
        }
    }

    front.extend(back);
    front
}
