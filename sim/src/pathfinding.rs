//! Breadth-first route search over terrain tiles.

use crate::components::Position;
use crate::terrain::TerrainProvider;

const NO_PARENT: usize = usize::MAX;

/// Shortest-hop route from `from` to `to` over 4-connected passable tiles.
///
/// Waypoints are the centers of the tiles after the start tile, with the
/// last one replaced by `to` itself. When both ends share a tile the route
/// is just `to`. Returns an empty route when either end is off the map, the
/// goal tile is impassable or no path exists. The start tile itself is
/// never tested, so a tank standing on rough ground can still leave it.
pub fn bfs_route<T: TerrainProvider + ?Sized>(terrain: &T, from: Position, to: Position) -> Vec<Position> {
    let (Some(start), Some(goal)) = (terrain.tile_of(from), terrain.tile_of(to)) else {
        return Vec::new();
    };
    if start == goal {
        return vec![to];
    }
    if !terrain.is_passable(goal.0, goal.1) {
        return Vec::new();
    }

    let width = terrain.width();
    let height = terrain.height();
    let index = |(x, y): (usize, usize)| y * width + x;
    let start_idx = index(start);
    let goal_idx = index(goal);

    let mut parent = vec![NO_PARENT; width * height];
    let mut queue = Vec::with_capacity(width * height);
    parent[start_idx] = start_idx;
    queue.push(start_idx);

    let mut head = 0;
    let mut found = false;
    while head < queue.len() {
        let current = queue[head];
        head += 1;
        if current == goal_idx {
            found = true;
            break;
        }

        let (x, y) = (current % width, current / width);
        for (nx, ny) in orthogonal_neighbors(x, y, width, height) {
            let next = index((nx, ny));
            if parent[next] != NO_PARENT || !terrain.is_passable(nx, ny) {
                continue;
            }
            parent[next] = current;
            queue.push(next);
        }
    }

    if !found {
        return Vec::new();
    }

    let mut tiles = Vec::new();
    let mut at = goal_idx;
    while at != start_idx {
        tiles.push(at);
        at = parent[at];
    }
    tiles.reverse();

    let mut route: Vec<Position> = tiles
        .into_iter()
        .map(|i| terrain.tile_center(i % width, i / width))
        .collect();
    if let Some(last) = route.last_mut() {
        *last = to;
    }
    route
}

fn orthogonal_neighbors(x: usize, y: usize, width: usize, height: usize) -> impl Iterator<Item = (usize, usize)> {
    let right = (x + 1 < width).then_some((x + 1, y));
    let left = x.checked_sub(1).map(|nx| (nx, y));
    let down = (y + 1 < height).then_some((x, y + 1));
    let up = y.checked_sub(1).map(|ny| (x, ny));
    [right, left, down, up].into_iter().flatten()
}
